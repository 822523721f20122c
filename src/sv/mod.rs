pub mod batch;
pub mod bulk;
pub mod gate;
pub mod ledger;
pub mod lifecycle;
pub mod request;
pub mod usage;
pub mod user;

pub use batch::BatchExecutor;
pub use bulk::Bulk;
pub use gate::Gate;
pub use ledger::Ledger;
pub use lifecycle::Lifecycle;
pub use user::User;
