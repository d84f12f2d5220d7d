// crates/donation-server/tests/server_sessions.rs
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use donation_core::{CharityRecord, Discipline, FinalStats};
use donation_protocol::frames::StatsReply;
use donation_protocol::{FrameLayout, Request, Response};
use donation_server::framing::{write_request, FrameReader};
use donation_server::{Config, Role, Server, ServerError, Shutdown};
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const DEADLINE: Duration = Duration::from_secs(5);

struct Running {
    server_addrs: Vec<(Role, SocketAddr)>,
    shutdown: Shutdown,
    task: JoinHandle<FinalStats>,
    log_path: PathBuf,
    _dir: TempDir,
}

impl Running {
    async fn start(build: impl FnOnce(PathBuf) -> Config) -> Running {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("events.log");
        let config = build(log_path.clone()).with_bind_addr("127.0.0.1");

        let server = Server::bind(config).await.unwrap();
        let server_addrs = [Role::Combined, Role::Observer, Role::Donor]
            .into_iter()
            .filter_map(|role| server.local_addr(role).map(|addr| (role, addr)))
            .collect();
        let shutdown = server.shutdown_handle();
        let task = tokio::spawn(server.run());

        Running {
            server_addrs,
            shutdown,
            task,
            log_path,
            _dir: dir,
        }
    }

    async fn combined() -> Running {
        Running::start(|path| Config::combined(0, path)).await
    }

    fn addr(&self, role: Role) -> SocketAddr {
        self.server_addrs
            .iter()
            .find(|(r, _)| *r == role)
            .map(|(_, addr)| *addr)
            .unwrap()
    }

    async fn stop(self) -> (FinalStats, String) {
        self.shutdown.trigger();
        let stats = timeout(DEADLINE, self.task)
            .await
            .expect("server did not shut down")
            .unwrap();
        let log = std::fs::read_to_string(&self.log_path).unwrap();
        (stats, log)
    }
}

struct Client {
    frames: FrameReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    layout: FrameLayout,
}

impl Client {
    async fn connect(addr: SocketAddr, layout: FrameLayout) -> Client {
        let (read_half, writer) = TcpStream::connect(addr).await.unwrap().into_split();
        Client {
            frames: FrameReader::new(read_half, layout),
            writer,
            layout,
        }
    }

    async fn call(&mut self, req: Request) -> Response {
        write_request(&mut self.writer, &req, self.layout).await.unwrap();
        self.response().await
    }

    async fn response(&mut self) -> Response {
        timeout(DEADLINE, self.frames.next_response())
            .await
            .expect("no response")
            .unwrap()
            .expect("connection closed")
    }

    async fn donate(&mut self, charity: u8, amount: u64) -> Response {
        self.call(Request::Donate { charity, amount }).await
    }

    async fn cinfo(&mut self, charity: u8) -> Response {
        self.call(Request::Cinfo { charity }).await
    }
}

fn lines(log: &str) -> Vec<&str> {
    log.lines().collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn donor_session_updates_ledger_and_board() {
    let server = Running::combined().await;
    let addr = server.addr(Role::Combined);

    let mut donor = Client::connect(addr, FrameLayout::Compact).await;
    assert_eq!(
        donor.donate(2, 100).await,
        Response::Donate { charity: 2, amount: 100 }
    );
    assert_eq!(
        donor.donate(2, 50).await,
        Response::Donate { charity: 2, amount: 50 }
    );
    assert_eq!(donor.call(Request::Logout).await, Response::Logout);

    let mut viewer = Client::connect(addr, FrameLayout::Compact).await;
    assert_eq!(
        viewer.cinfo(2).await,
        Response::Cinfo(CharityRecord::new(150, 100, 2))
    );
    assert_eq!(viewer.call(Request::Top).await, Response::Top([150, 0, 0]));

    let (stats, log) = server.stop().await;
    assert_eq!(stats.records[2], CharityRecord::new(150, 100, 2));
    assert_eq!(stats.client_count, 2);
    assert_eq!(stats.top, [150, 0, 0]);
    assert_eq!(
        stats.charity_report(),
        "0, 0, 0, 0\n1, 0, 0, 0\n2, 2, 100, 150\n3, 0, 0, 0\n4, 0, 0, 0\n"
    );
    assert_eq!(
        lines(&log),
        ["1 DONATE 2 100", "1 DONATE 2 50", "1 LOGOUT", "2 CINFO 2", "2 TOP"]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_clients_see_each_others_donations() {
    let server = Running::combined().await;
    let addr = server.addr(Role::Combined);

    let mut a = Client::connect(addr, FrameLayout::Compact).await;
    let mut b = Client::connect(addr, FrameLayout::Compact).await;

    let (ra, rb) = tokio::join!(a.donate(0, 10), b.donate(1, 10));
    assert_eq!(ra, Response::Donate { charity: 0, amount: 10 });
    assert_eq!(rb, Response::Donate { charity: 1, amount: 10 });

    let (ia, ib) = tokio::join!(a.cinfo(1), b.cinfo(0));
    assert_eq!(ia, Response::Cinfo(CharityRecord::new(10, 10, 1)));
    assert_eq!(ib, Response::Cinfo(CharityRecord::new(10, 10, 1)));

    let (stats, _) = server.stop().await;
    assert_eq!(stats.records[0], CharityRecord::new(10, 10, 1));
    assert_eq!(stats.records[1], CharityRecord::new(10, 10, 1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn bad_frames_get_error_and_keep_the_connection() {
    let server = Running::combined().await;
    let mut client = Client::connect(server.addr(Role::Combined), FrameLayout::Compact).await;

    assert_eq!(client.donate(5, 100).await, Response::Error);
    assert_eq!(client.cinfo(5).await, Response::Error);

    // A tag the server does not know is one byte long in this layout.
    client.writer.write_all(&[0x09]).await.unwrap();
    assert_eq!(client.response().await, Response::Error);

    assert_eq!(client.call(Request::Top).await, Response::Top([0, 0, 0]));

    let (stats, log) = server.stop().await;
    assert_eq!(stats.records, [CharityRecord::default(); 5]);
    assert_eq!(lines(&log), ["1 ERROR", "1 ERROR", "1 ERROR", "1 TOP"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stats_reports_extremes_with_lowest_id_on_ties() {
    let server = Running::combined().await;
    let mut client = Client::connect(server.addr(Role::Combined), FrameLayout::Compact).await;

    client.donate(1, 40).await;
    client.donate(3, 90).await;
    assert_eq!(
        client.call(Request::Stats).await,
        Response::Stats(StatsReply {
            max_charity: 3,
            min_charity: 0,
            max_amount: 90,
            min_amount: 0,
        })
    );

    let (_, log) = server.stop().await;
    assert_eq!(lines(&log).last(), Some(&"1 STATS 0:0 3:90"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_donors_under_the_reader_writer_gate() {
    let server = Running::start(|path| {
        Config::combined(0, path).with_discipline(Discipline::ReaderWriter)
    })
    .await;
    let addr = server.addr(Role::Combined);

    let mut donors = Vec::new();
    for n in 0..8u8 {
        donors.push(tokio::spawn(async move {
            let mut client = Client::connect(addr, FrameLayout::Compact).await;
            for _ in 0..50 {
                client.donate(n % 5, 1).await;
                client.call(Request::Stats).await;
            }
            client.call(Request::Logout).await
        }));
    }
    for donor in donors {
        assert_eq!(donor.await.unwrap(), Response::Logout);
    }

    let (stats, log) = server.stop().await;
    let total: u64 = stats.records.iter().map(|r| r.total_donation_amt).sum();
    assert_eq!(total, 400);
    assert_eq!(stats.records[0].num_donations, 100);
    assert_eq!(stats.client_count, 8);
    assert_eq!(stats.top, [50, 50, 50]);
    assert_eq!(lines(&log).len(), 8 * 101);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shutdown_closes_idle_connections() {
    let server = Running::combined().await;
    let addr = server.addr(Role::Combined);

    let mut clients = Vec::new();
    for n in 0..3u8 {
        let mut client = Client::connect(addr, FrameLayout::Compact).await;
        client.donate(n, 5).await;
        clients.push(client);
    }

    // Every handler is now parked in a read.
    let (stats, _) = server.stop().await;
    assert_eq!(stats.client_count, 3);
    assert_eq!(stats.top, [0, 0, 0]);
    for rec in &stats.records[..3] {
        assert_eq!(*rec, CharityRecord::new(5, 5, 1));
    }

    for mut client in clients {
        let end = timeout(DEADLINE, client.frames.next_response())
            .await
            .expect("socket left open");
        assert!(matches!(end, Ok(None) | Err(_)), "{end:?}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn split_deployment_enforces_roles_over_legacy_frames() {
    let server = Running::start(|path| {
        Config::split(0, 0, path).with_layout(FrameLayout::Legacy)
    })
    .await;

    let mut donor = Client::connect(server.addr(Role::Donor), FrameLayout::Legacy).await;
    let mut observer = Client::connect(server.addr(Role::Observer), FrameLayout::Legacy).await;

    assert_eq!(
        donor.donate(0, 25).await,
        Response::Donate { charity: 0, amount: 25 }
    );
    assert_eq!(donor.cinfo(0).await, Response::Error);

    assert_eq!(observer.donate(0, 1).await, Response::Error);
    assert_eq!(
        observer.cinfo(0).await,
        Response::Cinfo(CharityRecord::new(25, 25, 1))
    );
    assert_eq!(observer.call(Request::Logout).await, Response::Logout);
    assert_eq!(donor.call(Request::Logout).await, Response::Logout);

    let (stats, _) = server.stop().await;
    assert_eq!(stats.top, [25, 0, 0]);
    assert_eq!(stats.records[0], CharityRecord::new(25, 25, 1));
}

async fn bind_error(config: Config) -> ServerError {
    Server::bind(config.with_bind_addr("127.0.0.1"))
        .await
        .err()
        .expect("server started")
}

#[tokio::test]
async fn startup_failures_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = |name: &str| -> PathBuf { dir.path().join(name) };

    let missing = Path::new("no-such-dir").join("events.log");
    let err = bind_error(Config::combined(0, dir.path().join(missing))).await;
    assert!(matches!(err, ServerError::LogFile { .. }), "{err}");

    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();
    let err = bind_error(Config::combined(port, log_path("a.log"))).await;
    assert!(matches!(err, ServerError::Bind { .. }), "{err}");

    let err = bind_error(Config::split(9100, 9100, log_path("b.log"))).await;
    assert!(matches!(err, ServerError::Config(_)), "{err}");
}
