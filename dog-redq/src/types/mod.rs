pub mod ids;
pub mod task;
pub mod events;

pub use ids::WorkerId;
pub use task::Task;
pub use events::TaskEvent;
