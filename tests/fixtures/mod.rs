
#[allow(unused_imports)]
pub use factories::*;
