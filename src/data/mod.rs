pub mod column;
pub mod frame;
pub mod value;

pub use column::{Column, ColumnIter};
pub use frame::{Field, Frame, FrameError, Labels};
pub use value::{FieldType, FieldValue, Value};
