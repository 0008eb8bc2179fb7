//! Time tracking model definitions

pub mod activity;
pub mod client;
pub mod group;
pub mod project;
pub mod tag;
pub mod task;
pub mod user;

use crate::database::ModelDef;

pub use activity::ACTIVITY;
pub use client::CLIENT;
pub use group::GROUP;
pub use project::PROJECT;
pub use tag::TAG;
pub use task::TASK;
pub use user::USER;

/// Every model, in table creation order
pub static ALL_MODELS: [&ModelDef; 7] = [&USER, &GROUP, &CLIENT, &PROJECT, &TASK, &TAG, &ACTIVITY];

/// SQL default for datetime columns filled at insert time
pub(crate) const NOW: &str = "(strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))";
