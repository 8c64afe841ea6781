//! Walk through the lifecycle of every plan kind.
//!
//! ```bash
//! cargo run -p dpp-plan --example plan_lifecycle
//! DPP_PLAN__LOGGING__LEVEL=dpp_plan=debug cargo run -p dpp-plan --example plan_lifecycle
//! ```

use dpp_plan::{
    Algorithm, CompactPlan, Configuration, DataType, LoggingConfig, Manager, ManagerConfig,
    Operator, Options, RadixSortPlan, SparseMatrixVectorMultiplyPlan,
};
use tracing_subscriber::EnvFilter;

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match logging.format.as_str() {
        "json" => builder.json().init(),
        "compact" => builder.compact().init(),
        _ => builder.pretty().init(),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ManagerConfig::load()?;
    init_tracing(&config.logging);

    let mut manager = Manager::new(&config)?;

    let compact = manager.create_plan(
        Configuration::new(Algorithm::Compact, Operator::Add, DataType::Float, Options::FORWARD),
        1 << 20,
        1,
        0,
    )?;
    let scan = manager.resolve::<CompactPlan>(compact)?.scan_plan();
    println!("compact {} owns scan {}", compact, scan);

    let sort = manager.create_plan(
        Configuration::new(Algorithm::RadixSort, Operator::Add, DataType::UInt, Options::KEYS_ONLY),
        1000,
        1,
        0,
    )?;
    let radix = manager.resolve::<RadixSortPlan>(sort)?;
    println!(
        "radix sort {}: {} block(s), nested scan of {} elements",
        sort,
        radix.num_blocks(),
        manager.plan(radix.scan_plan())?.num_elements()
    );

    let values = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0];
    let columns = [0u32, 1, 2, 2, 0, 1, 1, 2, 2, 0, 1, 2];
    let spmv = manager.create_sparse_matrix_object(
        Configuration::new(
            Algorithm::SparseMatrixVectorMultiply,
            Operator::Add,
            DataType::Float,
            Options::NONE,
        ),
        12,
        3,
        &values,
        &[0, 4, 9],
        &columns,
    )?;
    println!(
        "sparse matrix {}: row final indices {:?}",
        spmv,
        manager
            .resolve::<SparseMatrixVectorMultiplyPlan>(spmv)?
            .row_final_indices()
    );

    for handle in manager.handles() {
        println!("{}", serde_json::to_string(&manager.plan_info(handle)?)?);
    }
    println!("{}", serde_json::to_string_pretty(&manager.memory_stats())?);

    manager.destroy_plan(compact)?;
    manager.destroy_plan(sort)?;
    manager.destroy_sparse_matrix_object(spmv)?;
    println!("remaining plans: {}", manager.plan_count());

    Ok(())
}
