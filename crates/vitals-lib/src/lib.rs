pub mod alert;
pub mod detectors;
pub mod error;
pub mod history;
pub mod io;
pub mod monitor;
pub mod plot;
pub mod reading;
pub mod source;

pub use alert::*;
pub use detectors::*;
pub use error::*;
pub use history::*;
pub use monitor::*;
pub use reading::*;
pub use source::*;
