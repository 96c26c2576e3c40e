use holepunch::udp::{Client, ClientConfig, Server, ServerConfig};
use std::error::Error;
use std::sync::atomic::AtomicBool;
use std::thread;
use std::time;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger_init();

    let server_addr = "127.0.0.1:8888";

    {
        thread::spawn(move || {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let s = Server::new(server_addr, ServerConfig::default()).await.unwrap();
                s.run(std::future::pending()).await.unwrap();
            })
        });
    }

    let t = {
        thread::spawn(move || {
            let local = "127.0.0.1:0".parse().ok();
            let c = Client::new(server_addr, local, ClientConfig::default()).unwrap();
            let me = c.mapped_address().unwrap();
            let peer = c.listen(me, &AtomicBool::new(false)).unwrap().unwrap();
            let data = c.await_peer(peer, time::Duration::from_secs(5)).unwrap();
            println!("responder got {:?}", data.map(String::from_utf8));
        })
    };

    let local = "127.0.0.1:0".parse().ok();
    let c = Client::new(server_addr, local, ClientConfig::default())?;
    let me = c.mapped_address()?;
    loop {
        match c.server_list()?.first() {
            Some(target) => {
                let peer = c.connect(me, *target)?;
                c.await_peer(peer, time::Duration::from_secs(5))?;
                c.transport().send_to(b"hello", peer)?;
                break;
            }
            None => thread::sleep(time::Duration::from_millis(200)),
        }
    }

    t.join().unwrap();

    Ok(())
}

fn env_logger_init() {
    #[cfg(feature = "env_logger")]
    env_logger::init();
}
