use serde::{Deserialize, Serialize};

/// Pricing tier of a VM instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PricingTier {
    PreReserved,
    OnDemand,
    Spot,
}

impl PricingTier {
    /// Fallback order used whenever a preferred pool cannot serve a request.
    pub const FALLBACK_ORDER: [PricingTier; 3] = [PricingTier::PreReserved, PricingTier::Spot, PricingTier::OnDemand];

    pub fn as_str(&self) -> &'static str {
        match self {
            PricingTier::PreReserved => "reserved",
            PricingTier::OnDemand => "on_demand",
            PricingTier::Spot => "spot",
        }
    }
}

impl std::fmt::Display for PricingTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hourly rates per pricing tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VmPricing {
    pub on_demand: f64,
    pub reserved: f64,
    pub spot: f64,
}

impl VmPricing {
    pub fn rate(&self, tier: PricingTier) -> f64 {
        match tier {
            PricingTier::PreReserved => self.reserved,
            PricingTier::OnDemand => self.on_demand,
            PricingTier::Spot => self.spot,
        }
    }
}

/// A VM configuration from the catalog. Read-only after load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmType {
    pub id: String,
    pub family: String,
    pub vcpus: u32,
    pub memory_gb: f64,
    pub storage_gb: f64,
    pub network_gbps: f64,
    pub gpu: bool,

    /// Missing pricing falls back to a documented neutral hourly rate in the
    /// cost model instead of failing.
    pub pricing: Option<VmPricing>,
}

/// The immutable catalog of available VM types, supplied by an external
/// loader. Entries are addressed by their position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmCatalog {
    types: Vec<VmType>,
}

impl VmCatalog {
    pub fn new(types: Vec<VmType>) -> Self {
        Self { types }
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&VmType> {
        self.types.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &VmType> {
        self.types.iter()
    }

    /// Mean vCPU count over the catalog, used as the reference machine for
    /// deadline derivation.
    pub fn average_vcpus(&self) -> f64 {
        if self.types.is_empty() {
            return 0.0;
        }
        let total: u32 = self.types.iter().map(|t| t.vcpus).sum();
        total as f64 / self.types.len() as f64
    }
}
