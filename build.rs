// 在庫サービスのgRPCコード生成
// .protoファイルは使わず、メッセージ型は src/adapter/inventory_proto.rs に定義する
fn main() {
    let service = tonic_build::manual::Service::builder()
        .name("InventoryService")
        .package("ecommerce.inventory")
        .method(
            tonic_build::manual::Method::builder()
                .name("get_product_info")
                .route_name("GetProductInfo")
                .input_type("crate::adapter::inventory_proto::GetProductInfoRequest")
                .output_type("crate::adapter::inventory_proto::GetProductInfoResponse")
                .codec_path("tonic::codec::ProstCodec")
                .build(),
        )
        .method(
            tonic_build::manual::Method::builder()
                .name("reserve_stock")
                .route_name("ReserveStock")
                .input_type("crate::adapter::inventory_proto::ReserveStockRequest")
                .output_type("crate::adapter::inventory_proto::ReserveStockResponse")
                .codec_path("tonic::codec::ProstCodec")
                .build(),
        )
        .method(
            tonic_build::manual::Method::builder()
                .name("release_stock")
                .route_name("ReleaseStock")
                .input_type("crate::adapter::inventory_proto::ReleaseStockRequest")
                .output_type("crate::adapter::inventory_proto::ReleaseStockResponse")
                .codec_path("tonic::codec::ProstCodec")
                .build(),
        )
        .build();

    tonic_build::manual::Builder::new().compile(&[service]);
}
