//! Adapter implementations.
//!
//! Official API adapters (`ebay`, `etsy`) carry their own wire formats; the
//! public search adapters (`html`, `json`) are driven entirely by the source
//! definition.

pub mod ebay;
pub mod etsy;
pub mod html;
pub mod json;

pub use ebay::EbayAdapter;
pub use etsy::EtsyAdapter;
pub use html::HtmlSearchAdapter;
pub use json::JsonSearchAdapter;
