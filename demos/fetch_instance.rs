// Demo: load an instance and its reference solution from a running registry
//
// Usage: cargo run --features grpc --example fetch_instance -- [model] [instance]
// Defaults to the LABS integer model, instance labs002 (see push_stream).

use std::env;
use std::sync::Arc;

use qoblib::{verify_solution, Dataset, DatasetAccessor, DatasetError, GrpcArtifactStore};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = env::args().skip(1);
    let model = args.next().unwrap_or_else(|| "integer".to_string());
    let instance = args.next().unwrap_or_else(|| "labs002".to_string());

    let store = Arc::new(GrpcArtifactStore::connect("http://127.0.0.1:50061")?);
    let labs = DatasetAccessor::new(Dataset::labs(), store);

    println!("=== {} / {} / {} ===\n", labs.dataset().name(), model, instance);

    let (instance, solution) = match labs.load(&model, &instance) {
        Ok(loaded) => loaded,
        Err(e @ DatasetError::NotFound(_)) | Err(e @ DatasetError::InvalidArgument(_)) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    println!("Instance: {}", instance.metadata.title);
    println!("  • dataset: {}", instance.metadata.dataset);
    println!("  • sense: {}", instance.sense);
    println!(
        "  • {} variables ({} integer), {} constraints",
        instance.num_variables(),
        instance.num_integer_variables(),
        instance.num_constraints()
    );

    match solution {
        Some(solution) => {
            let report = verify_solution(&instance, &solution)?;
            println!("\nReference solution:");
            println!("  • objective: {}", solution.objective);
            println!("  • feasible: {}", solution.feasible);
            println!(
                "  • re-evaluation {}",
                if report.is_consistent() { "matches" } else { "DIFFERS" }
            );
        }
        None => println!("\nNo reference solution packaged."),
    }

    Ok(())
}
