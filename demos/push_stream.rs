// Demo: package LABS instances and stream them to a running registry
//
// Builds labs002..labs006 for both LABS models from their known optimal
// sequences, then uploads each archive in chunks over the PushArtifact stream.
// Start the server first: cargo run --features grpc --bin qoblib-registry

use futures::stream;
use tonic::Request;

use qoblib::application::mappers::registry_proto::{
    artifact_registry_client::ArtifactRegistryClient, ListTagsRequest, PushChunk,
};
use qoblib::domain::catalog::{ImageReference, QOBLIB_REPOSITORY};
use qoblib::{convert, ConverterFactory};

const CHUNK_SIZE: usize = 1024;

// One optimal sequence per length
const OPTIMA: &[(&str, &str)] = &[
    ("labs002", "# Energy: 1\n1\n1\n"),
    ("labs003", "# Energy: 1\n1\n1\n0\n"),
    ("labs004", "# Energy: 2\n1\n1\n0\n1\n"),
    ("labs005", "# Energy: 2\n1\n1\n1\n0\n1\n"),
    ("labs006", "# Energy: 7\n1\n1\n1\n0\n1\n1\n"),
];

fn chunks(reference: &ImageReference, bytes: &[u8]) -> Vec<PushChunk> {
    bytes
        .chunks(CHUNK_SIZE)
        .enumerate()
        .map(|(i, data)| PushChunk {
            repository: if i == 0 { reference.repository.clone() } else { String::new() },
            tag: if i == 0 { reference.tag.clone() } else { String::new() },
            data: data.to_vec(),
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut client = ArtifactRegistryClient::connect("http://127.0.0.1:50061").await?;

    println!("=== Pushing LABS archives (gRPC streaming) ===\n");

    for model in ["integer", "quadratic_unconstrained"] {
        let converter = ConverterFactory::create("02_labs", model)?;
        for (name, sol) in OPTIMA {
            let artifact = convert(converter.as_ref(), name, "", Some(*sol))?;
            let reference = ImageReference::qoblib("02_labs", model, name);
            let bytes = artifact.to_bytes();

            let outgoing = chunks(&reference, &bytes);
            let count = outgoing.len();
            let response = client
                .push_artifact(Request::new(stream::iter(outgoing)))
                .await?
                .into_inner();

            let solution = artifact.solution.as_ref();
            println!(
                "✓ {} ({} bytes in {} chunks, objective {:?})",
                response.reference,
                response.size,
                count,
                solution.map(|s| s.objective)
            );
        }
    }

    let tags = client
        .list_tags(Request::new(ListTagsRequest {
            repository: QOBLIB_REPOSITORY.to_string(),
        }))
        .await?
        .into_inner()
        .tags;

    println!("\nRegistry now holds {} tags:", tags.len());
    for tag in tags {
        println!("  • {}", tag);
    }

    Ok(())
}
