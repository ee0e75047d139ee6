use std::{future::Future, net::SocketAddr, time::Duration};

use formscan::FormReader;
use formscan_server::{serve, ServerConfig};

pub async fn test_with_server<F, Fut>(reader: FormReader, test: F) -> anyhow::Result<()>
where
    F: FnOnce(SocketAddr) -> Fut,
    Fut: Future<Output = ()>,
{
    let config = ServerConfig {
        addr: get_unused_tcp_socket_addr(),
        request_timeout: Duration::from_secs(30),
    };

    let server = spawn_server(config, reader).await?;

    tokio::select! {
        _ = server => {
            panic!("the server terminated before the test finished");
        }
        _ = test(config.addr) => {}
    };

    Ok(())
}

/// Returns an unused IPv4 TCP socket address on the loopback interface.
fn get_unused_tcp_socket_addr() -> SocketAddr {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
}

/// Spawns a server and waits for its health endpoint to answer.
/// Abort if it does not answer within 2 seconds.
pub async fn spawn_server(
    config: ServerConfig,
    reader: FormReader,
) -> anyhow::Result<tokio::task::JoinHandle<anyhow::Result<()>>> {
    let server = tokio::spawn(serve(config, reader));

    let health = format!("http://{}/health", config.addr);
    let mut attempts = 0;
    loop {
        match reqwest::get(&health).await {
            Ok(_) => break,
            Err(e) => {
                attempts += 1;

                if attempts == 16 {
                    anyhow::bail!(e);
                } else {
                    tokio::time::sleep(Duration::from_millis(125)).await;
                    continue;
                }
            }
        }
    }

    Ok(server)
}

/// A blank PNG page, for uploads whose content the scripted engine decides.
pub fn blank_png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    image::DynamicImage::ImageLuma8(image::GrayImage::from_pixel(width, height, image::Luma([255])))
        .write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageOutputFormat::Png,
        )
        .unwrap();
    bytes
}
