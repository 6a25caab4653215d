pub mod extract;
pub mod mapping;
pub mod verification;
pub mod dedupe;
pub mod publish;
pub mod review;
