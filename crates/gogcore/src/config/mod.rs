pub mod ini;
pub mod lgog;
