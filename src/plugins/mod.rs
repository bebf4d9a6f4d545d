pub mod shodan;
pub mod sucuri;
pub mod zap;

pub use shodan::ShodanAdapter;
pub use sucuri::SucuriAdapter;
pub use zap::ZapAdapter;
