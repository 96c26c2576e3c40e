use holepunch::udp::{Client, ClientConfig, Server, ServerConfig};
use std::io::{Error, ErrorKind};
use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(name = "holepunch")]
enum Opt {
    /// run a rendezvous server
    Server(ServerOpt),
    /// register with a rendezvous server and wait for an initiator
    Responder(ClientOpt),
    /// list registered peers, or connect one of them
    Initiator(InitiatorOpt),
}

#[derive(StructOpt, Debug)]
struct ServerOpt {
    #[structopt(long = "listen-addr", default_value = "0.0.0.0:8888")]
    listen_addr: Vec<SocketAddr>,

    /// forget peers not registering again within this many seconds
    #[structopt(long = "expire-secs")]
    expire_secs: Option<u64>,

    #[structopt(long = "secret")]
    secret: Option<String>,
}

#[derive(StructOpt, Debug)]
struct ClientOpt {
    #[structopt(long = "server-addr")]
    server_addr: String,

    #[structopt(long = "local-addr")]
    local_addr: Option<SocketAddr>,

    #[structopt(long = "secret")]
    secret: Option<String>,
}

#[derive(StructOpt, Debug)]
struct InitiatorOpt {
    #[structopt(flatten)]
    client: ClientOpt,

    /// endpoint to connect, as listed by the server
    #[structopt(long = "target")]
    target: Option<SocketAddr>,
}

fn main() -> holepunch::Result<()> {
    env_logger::init();

    let opt: Opt = StructOpt::from_args();

    match opt {
        Opt::Server(opt) => run_server(opt),
        Opt::Responder(opt) => run_responder(opt),
        Opt::Initiator(opt) => run_initiator(opt),
    }
}

fn run_server(opt: ServerOpt) -> holepunch::Result<()> {
    let config = ServerConfig {
        expire_after: opt.expire_secs.map(Duration::from_secs),
        secret: opt.secret.map(String::into_bytes),
        ..Default::default()
    };

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let (first, rest) = opt
            .listen_addr
            .split_first()
            .ok_or_else(|| Error::new(ErrorKind::Other, "no listen address"))?;
        let mut s = Server::new(*first, config).await?;
        for addr in rest {
            s.add_listener(*addr).await?;
        }
        s.run(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
    })?;

    Ok(())
}

fn new_client(opt: ClientOpt) -> holepunch::Result<Client> {
    let config = ClientConfig {
        secret: opt.secret.map(String::into_bytes),
        ..Default::default()
    };
    Client::new(&opt.server_addr, opt.local_addr, config)
}

fn run_responder(opt: ClientOpt) -> holepunch::Result<()> {
    let c = new_client(opt)?;
    let me = c.mapped_address()?;
    log::info!("public endpoint {}", me);

    let stop = AtomicBool::new(false);
    if let Some(peer) = c.listen(me, &stop)? {
        log::info!("punched {}", peer);
        if let Some(data) = c.await_peer(peer, Duration::from_secs(10))? {
            println!("{} says {}", peer, String::from_utf8_lossy(&data));
        }
    }

    Ok(())
}

fn run_initiator(opt: InitiatorOpt) -> holepunch::Result<()> {
    let c = new_client(opt.client)?;

    let target = match opt.target {
        Some(t) => t,
        None => {
            for peer in c.server_list()? {
                println!("{}", peer);
            }
            return Ok(());
        }
    };

    let me = c.mapped_address()?;
    let peer = c.connect(me, target)?;
    log::info!("punched {}", peer);

    match c.await_peer(peer, Duration::from_secs(10))? {
        Some(data) => println!("{} says {}", peer, String::from_utf8_lossy(&data)),
        None => println!("no traffic from {}", peer),
    }

    Ok(())
}
