//! Generates the gRPC client and server stubs for the three escrow services.
//!
//! Messages are plain prost structs in `proto.rs`, so services are described
//! with the manual builder and no protoc is needed at build time.

use tonic_build::manual::{Builder, Method, Service};

fn unary(name: &str, route: &str, input: &str, output: &str) -> Method {
    Method::builder()
        .name(name)
        .route_name(route)
        .input_type(format!("crate::proto::{input}"))
        .output_type(format!("crate::proto::{output}"))
        .codec_path("tonic::codec::ProstCodec")
        .build()
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let keyholder = Service::builder()
        .name("KeyHolder")
        .package("escrow.keyholder")
        .method(unary("store_share", "StoreShare", "StoreShareRequest", "StoreShareResponse"))
        .method(unary("get_share", "GetShare", "GetShareRequest", "GetShareResponse"))
        .method(unary("describe", "Describe", "DescribeRequest", "DescribeResponse"))
        .method(unary("health", "Health", "HealthRequest", "HealthResponse"))
        .build();

    let gateway = Service::builder()
        .name("StorageGateway")
        .package("escrow.gateway")
        .method(unary("store", "Store", "StoreRequest", "StoreResponse"))
        .method(unary("retrieve", "Retrieve", "RetrieveRequest", "RetrieveResponse"))
        .method(unary("retrieve_sealed", "RetrieveSealed", "RetrieveSealedRequest", "RetrieveSealedResponse"))
        .method(unary("operator_info", "OperatorInfo", "OperatorInfoRequest", "OperatorInfoResponse"))
        .method(unary("health", "Health", "HealthRequest", "HealthResponse"))
        .build();

    let ledger = Service::builder()
        .name("Ledger")
        .package("escrow.ledger")
        .method(unary("submit_blob", "SubmitBlob", "SubmitBlobRequest", "SubmitBlobResponse"))
        .method(unary("fetch_blob", "FetchBlob", "FetchBlobRequest", "FetchBlobResponse"))
        .method(unary("read_account", "ReadAccount", "ReadAccountRequest", "ReadAccountResponse"))
        .method(unary("submit_instruction", "SubmitInstruction", "SubmitInstructionRequest", "SubmitInstructionResponse"))
        .method(unary("logs_since", "LogsSince", "LogsSinceRequest", "LogsSinceResponse"))
        .method(unary("put_account", "PutAccount", "PutAccountRequest", "PutAccountResponse"))
        .method(unary("append_log", "AppendLog", "AppendLogRequest", "AppendLogResponse"))
        .build();

    Builder::new().compile(&[keyholder, gateway, ledger]);
}
