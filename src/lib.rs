use crate::affinity::AffinityTable;
use crate::broker::{AffinityBroker, BrokerConfig, ExecutionResult};
use crate::cost::CostModel;
use crate::domain::vm::VmCatalog;
use crate::domain::workflow::Workflow;
use crate::error::Result;

pub mod affinity;
pub mod broker;
pub mod cost;
pub mod domain;
pub mod error;
pub mod logger;
pub mod pool;
pub mod profiling;
pub mod scheduler;
pub mod simulator;

pub fn schedule_workflow(
    workflow: &mut Workflow,
    catalog: VmCatalog,
    affinity: AffinityTable,
    config: BrokerConfig,
) -> Result<ExecutionResult> {
    logger::init();
    log::info!("Logger initialized. Starting workflow scheduling run.");

    let broker = AffinityBroker::new(catalog, affinity, CostModel::default(), config);
    let result = broker.run(workflow)?;
    log::info!("Scheduling run finished with total cost {:.4}.", result.total_cost);

    Ok(result)
}
