#[tokio::main]
async fn main() -> anyhow::Result<()> {
    beads_control_panel_lib::run().await
}
