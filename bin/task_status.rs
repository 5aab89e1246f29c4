use std::env;

use gasless_permit::*;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let id = env::args()
        .nth(1)
        .ok_or_else(|| eyre::eyre!("usage: task_status <task id>"))?;

    let relay = match env::var("GELATO_RELAY_URL") {
        Ok(url) => RelayClient::new(url)?,
        Err(_) => RelayClient::default(),
    };

    let task_status = relay.get_task_status(id.parse()?).await?;
    println!("Task status: {:?}", task_status);

    Ok(())
}
