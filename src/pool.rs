use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};

use crate::domain::vm::{PricingTier, VmCatalog, VmType};

new_key_type! {
    pub struct VmInstanceId;
}

/// A concrete VM instance held by the pool manager.
///
/// The allocated flag is the only state transition: the instance is owned by
/// the pool until allocated, then logically owned by the caller until
/// released.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmInstance {
    pub id: VmInstanceId,
    pub vm_type: VmType,
    pub tier: PricingTier,
    pub allocated: bool,
    pub start_time: f64,
    pub end_time: f64,
}

/// Per-tier instance counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierStats {
    pub total: usize,
    pub allocated: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub reserved: TierStats,
    pub spot: TierStats,
    pub on_demand: TierStats,
}

impl PoolStats {
    pub fn tier(&self, tier: PricingTier) -> TierStats {
        match tier {
            PricingTier::PreReserved => self.reserved,
            PricingTier::Spot => self.spot,
            PricingTier::OnDemand => self.on_demand,
        }
    }
}

#[derive(Debug, Default)]
struct PoolInner {
    slots: SlotMap<VmInstanceId, VmInstance>,

    /// Tier membership indexes into `slots`.
    reserved: Vec<VmInstanceId>,
    spot: Vec<VmInstanceId>,
    on_demand: Vec<VmInstanceId>,
}

impl PoolInner {
    fn tier_ids(&self, tier: PricingTier) -> &Vec<VmInstanceId> {
        match tier {
            PricingTier::PreReserved => &self.reserved,
            PricingTier::Spot => &self.spot,
            PricingTier::OnDemand => &self.on_demand,
        }
    }

    fn tier_ids_mut(&mut self, tier: PricingTier) -> &mut Vec<VmInstanceId> {
        match tier {
            PricingTier::PreReserved => &mut self.reserved,
            PricingTier::Spot => &mut self.spot,
            PricingTier::OnDemand => &mut self.on_demand,
        }
    }

    fn seed(&mut self, vm_type: &VmType, tier: PricingTier) -> VmInstanceId {
        let key = self.slots.insert_with_key(|id| VmInstance {
            id,
            vm_type: vm_type.clone(),
            tier,
            allocated: false,
            start_time: 0.0,
            end_time: 0.0,
        });
        self.tier_ids_mut(tier).push(key);
        return key;
    }

    /// First unallocated instance of the requested type within a tier.
    fn take_from_tier(&mut self, tier: PricingTier, desired: &VmType) -> Option<VmInstance> {
        let key = self
            .tier_ids(tier)
            .iter()
            .copied()
            .find(|&id| self.slots.get(id).is_some_and(|vm| !vm.allocated && vm.vm_type.id == desired.id))?;

        let instance = self.slots.get_mut(key).expect("tier index points at a live slot");
        instance.allocated = true;
        Some(instance.clone())
    }

    fn tier_stats(&self, tier: PricingTier) -> TierStats {
        let ids = self.tier_ids(tier);
        TierStats {
            total: ids.len(),
            allocated: ids.iter().filter(|&&id| self.slots.get(id).is_some_and(|vm| vm.allocated)).count(),
        }
    }
}

/// Tiered VM-instance pools (pre-reserved / spot / on-demand) with
/// allocate/release semantics.
///
/// Allocate and release run under a single mutex so the pool can be shared
/// between concurrent schedule executions. The on-demand tier is elastic:
/// it synthesizes a fresh instance whenever no free one matches, so
/// [`VmPoolManager::allocate`] never fails.
#[derive(Debug, Clone, Default)]
pub struct VmPoolManager {
    inner: Arc<Mutex<PoolInner>>,
}

impl VmPoolManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the pre-reserved pool with `count_per_type` instances of every
    /// catalog entry.
    pub fn seed_pre_reserved(&self, catalog: &VmCatalog, count_per_type: usize) {
        let mut inner = self.inner.lock().expect("Pool mutex poisoned");
        for vm_type in catalog.iter() {
            for _ in 0..count_per_type {
                inner.seed(vm_type, PricingTier::PreReserved);
            }
        }
    }

    /// Seeds the spot pool with `count_per_type` instances of every catalog
    /// entry.
    pub fn seed_spot(&self, catalog: &VmCatalog, count_per_type: usize) {
        let mut inner = self.inner.lock().expect("Pool mutex poisoned");
        for vm_type in catalog.iter() {
            for _ in 0..count_per_type {
                inner.seed(vm_type, PricingTier::Spot);
            }
        }
    }

    /// Pre-populates the elastic on-demand pool with one instance per
    /// catalog entry.
    pub fn seed_on_demand(&self, catalog: &VmCatalog) {
        let mut inner = self.inner.lock().expect("Pool mutex poisoned");
        for vm_type in catalog.iter() {
            inner.seed(vm_type, PricingTier::OnDemand);
        }
    }

    /// Allocates an instance of the desired type, trying the preferred tier
    /// first and then falling back through {pre-reserved, spot, on-demand}.
    ///
    /// Never fails: the on-demand tier synthesizes a new instance when no
    /// free one matches. The returned instance is marked allocated; it is
    /// never an instance some other caller still holds.
    pub fn allocate(&self, desired: &VmType, preferred: PricingTier) -> VmInstance {
        let mut inner = self.inner.lock().expect("Pool mutex poisoned");

        if let Some(instance) = inner.take_from_tier(preferred, desired) {
            return instance;
        }
        for tier in PricingTier::FALLBACK_ORDER {
            if tier == preferred {
                continue;
            }
            if let Some(instance) = inner.take_from_tier(tier, desired) {
                log::debug!("Tier {} exhausted for '{}', fell back to {}", preferred, desired.id, tier);
                return instance;
            }
        }

        // Elastic on-demand: synthesize a fresh instance.
        let key = inner.seed(desired, PricingTier::OnDemand);
        let instance = inner.slots.get_mut(key).expect("freshly seeded slot");
        instance.allocated = true;
        log::debug!("Synthesized on-demand instance for VM type '{}'", desired.id);
        return instance.clone();
    }

    /// Releases an instance back to its pool. Unknown ids are a no-op, so
    /// release is idempotent.
    pub fn release(&self, id: VmInstanceId) {
        let mut inner = self.inner.lock().expect("Pool mutex poisoned");
        match inner.slots.get_mut(id) {
            Some(instance) => instance.allocated = false,
            None => log::debug!("Release of unknown VM instance {:?} ignored", id),
        }
    }

    /// Distinct VM types with at least one unallocated instance in a tier.
    pub fn free_types(&self, tier: PricingTier) -> Vec<VmType> {
        let inner = self.inner.lock().expect("Pool mutex poisoned");
        let mut seen: Vec<VmType> = Vec::new();
        for &id in inner.tier_ids(tier) {
            if let Some(vm) = inner.slots.get(id) {
                if !vm.allocated && !seen.iter().any(|t| t.id == vm.vm_type.id) {
                    seen.push(vm.vm_type.clone());
                }
            }
        }
        return seen;
    }

    pub fn statistics(&self) -> PoolStats {
        let inner = self.inner.lock().expect("Pool mutex poisoned");
        PoolStats {
            reserved: inner.tier_stats(PricingTier::PreReserved),
            spot: inner.tier_stats(PricingTier::Spot),
            on_demand: inner.tier_stats(PricingTier::OnDemand),
        }
    }
}
