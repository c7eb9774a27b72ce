mod aggregation;
mod answer;
mod conversation;
mod intent;
mod plan;
mod record;
mod template;

pub use aggregation::*;
pub use answer::*;
pub use conversation::*;
pub use intent::*;
pub use plan::*;
pub use record::*;
pub use template::*;
