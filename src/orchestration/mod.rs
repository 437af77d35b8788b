//! Coordinators that turn events and clock ticks into persisted breakdowns.

pub mod lanes;
pub mod onboarding;
pub mod orchestrator;
pub mod scheduler;
pub mod tokens;
pub mod transfers;

pub use lanes::ChainLanes;
pub use onboarding::{Admission, Onboarder, UNKNOWN_PLATFORM};
pub use orchestrator::{
    BreakdownOrchestrator, EpisodeError, EpisodeOutcome, OrchestratorSettings, SkipReason,
};
pub use scheduler::{
    run_chain_clock, ClockOutcome, ClockSchedule, ClockScheduler, SchedulerError,
    DEFAULT_CLOCK_PERIOD_SECS,
};
pub use tokens::{TokenError, TokenRegistry};
pub use transfers::{
    BoostStake, ContractDeployed, EventContext, EventOutcome, ProcessingError, Transfer,
    TransferProcessor, UpgradeStrat,
};
