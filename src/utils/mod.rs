pub mod dates;
pub mod normalize;
pub mod signature;
pub mod time;
pub mod timeout;
