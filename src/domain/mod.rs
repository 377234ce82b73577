pub mod channel;
pub mod forecast;
pub mod frequency;
pub mod season;
pub mod series;
pub mod table;

pub use channel::*;
pub use forecast::*;
pub use frequency::*;
pub use season::*;
pub use series::*;
pub use table::*;
