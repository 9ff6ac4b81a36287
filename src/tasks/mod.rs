pub mod accessor;
pub mod clock;
pub mod filter;
pub mod memory;
pub mod model;
pub mod pg;
pub mod session;
pub mod table;

pub use accessor::{TaskAccessor, TaskError, COMPLETION_DELAY};
pub use clock::{Clock, FixedClock, SystemClock};
pub use filter::{classify, Tab, TabCounts, ViewState, PAGE_SIZE};
pub use memory::MemoryTaskTable;
pub use model::{NewTask, Task, TaskPatch};
pub use pg::PgTaskTable;
pub use session::{SessionRegistry, UserSession, IDLE_TIMEOUT};
pub use table::{ChangeEvent, ChangeKind, StoreError, TaskTable};
