pub mod enrichment;

pub use enrichment::{EnrichmentClient, EnrichmentError, EnrichmentSource};
