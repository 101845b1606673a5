pub mod coverage;
pub mod error;
pub mod logging;
pub mod mutants;
pub mod output;
pub mod proposer;
pub mod report;
pub mod runner;
pub mod safety;
pub mod session;
