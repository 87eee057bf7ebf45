pub mod kraken;
pub mod util;
