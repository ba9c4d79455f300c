//! Receive command implementation
//!
//! Appends documents to the receiving store from a file or stdin.

use super::{connect, load, parse_document_type, try_code, EXIT_FATAL, EXIT_OK, EXIT_VALIDATION};
use crate::core::receiving::ReceivingService;
use crate::domain::{DocumentType, HarborError, RecordId};
use clap::Args;
use std::path::PathBuf;
use tokio::io::{AsyncRead, AsyncReadExt, BufReader};

/// Arguments for the receive command
#[derive(Args, Debug)]
pub struct ReceiveArgs {
    /// Document type (e.g. enrollment, fhir, presence-absence)
    pub document_type: String,

    /// Read from this file instead of stdin
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Treat the input as newline-delimited JSON, one document per line
    #[arg(long)]
    pub ndjson: bool,
}

impl ReceiveArgs {
    /// Execute the receive command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let document_type = try_code!(parse_document_type(&self.document_type));
        let config = try_code!(load(config_path));
        let storage = try_code!(connect(&config).await);
        let service = ReceivingService::new(storage.receiving.clone());

        let result = match &self.file {
            Some(path) => {
                tracing::info!(path = %path.display(), document_type = %document_type, "Receiving from file");
                let file = tokio::fs::File::open(path).await?;
                self.receive(&service, document_type, file).await
            }
            None => {
                tracing::info!(document_type = %document_type, "Receiving from stdin");
                self.receive(&service, document_type, tokio::io::stdin())
                    .await
            }
        };

        match result {
            Ok(ids) => {
                match ids.as_slice() {
                    [] => println!("⚠️  No documents found in input"),
                    [id] => println!("✅ Received {document_type} record {id}"),
                    [first, .., last] => println!(
                        "✅ Received {} {document_type} records ({first}..={last})",
                        ids.len()
                    ),
                }
                Ok(EXIT_OK)
            }
            Err(HarborError::Validation(e)) => {
                println!("❌ Rejected: {e}");
                println!("   Nothing was stored");
                Ok(EXIT_VALIDATION)
            }
            Err(e) => {
                tracing::error!(error = %e, "Receive failed");
                println!("❌ Failed to store document");
                println!("   Error: {e}");
                Ok(EXIT_FATAL)
            }
        }
    }

    async fn receive<R>(
        &self,
        service: &ReceivingService,
        document_type: DocumentType,
        reader: R,
    ) -> crate::domain::Result<Vec<RecordId>>
    where
        R: AsyncRead + Unpin + Send,
    {
        if self.ndjson {
            return service
                .append_ndjson(document_type, BufReader::new(reader))
                .await;
        }

        let mut payload = String::new();
        let mut reader = reader;
        reader.read_to_string(&mut payload).await?;
        let id = service.append(document_type, &payload).await?;
        Ok(vec![id])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::database::Storage;

    fn args(ndjson: bool) -> ReceiveArgs {
        ReceiveArgs {
            document_type: "kit".to_string(),
            file: None,
            ndjson,
        }
    }

    #[tokio::test]
    async fn test_receive_single_document() {
        let storage = Storage::in_memory();
        let service = ReceivingService::new(storage.receiving.clone());

        let ids = args(false)
            .receive(&service, DocumentType::Kit, &b"{\"kit\": \"K-1\"}"[..])
            .await
            .unwrap();

        assert_eq!(ids.len(), 1);
        assert_eq!(service.count(DocumentType::Kit).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_receive_ndjson_lines() {
        let storage = Storage::in_memory();
        let service = ReceivingService::new(storage.receiving.clone());
        let input = b"{\"kit\": \"K-1\"}\n\n{\"kit\": \"K-2\"}\n";

        let ids = args(true)
            .receive(&service, DocumentType::Kit, &input[..])
            .await
            .unwrap();

        assert_eq!(ids.len(), 2);
    }

    #[tokio::test]
    async fn test_receive_rejects_array_payload() {
        let storage = Storage::in_memory();
        let service = ReceivingService::new(storage.receiving.clone());

        let result = args(false)
            .receive(&service, DocumentType::Kit, &b"[1, 2]"[..])
            .await;

        assert!(matches!(result, Err(HarborError::Validation(_))));
        assert_eq!(service.count(DocumentType::Kit).await.unwrap(), 0);
    }
}
