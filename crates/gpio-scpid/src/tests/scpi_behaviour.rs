//! Behavioural tests for SCPI sessions over real TCP connections.

use std::cell::RefCell;
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use gpio_scpi_config::ScpiEndpoint;

use crate::pins::{Direction, PinId, PinRegistry, PinTable, SimulatedDriver};
use crate::scpi::{IDENTITY, ScpiConnectionHandler};
use crate::transport::{ListenerHandle, SocketListener};

const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);
const SHORT_IDLE_TIMEOUT: Duration = Duration::from_millis(300);

struct Client {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Client {
    fn connect(addr: SocketAddr) -> Self {
        let writer = TcpStream::connect(addr).expect("connect client");
        writer
            .set_read_timeout(Some(CLIENT_TIMEOUT))
            .expect("set client timeout");
        let reader = BufReader::new(writer.try_clone().expect("clone client stream"));
        let mut client = Self { reader, writer };
        let banner = client.read_line();
        assert!(
            banner.starts_with("# LuckFox GPIO SCPI Server Ready - "),
            "unexpected banner: {banner:?}"
        );
        client
    }

    fn write_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).expect("write to server");
        self.writer.flush().expect("flush to server");
    }

    fn send(&mut self, command: &str) -> String {
        self.write_raw(format!("{command}\n").as_bytes());
        self.read_line()
    }

    fn read_line(&mut self) -> String {
        let mut line = String::new();
        self.reader.read_line(&mut line).expect("read from server");
        line.trim_end_matches('\n').to_owned()
    }
}

struct ScpiWorld {
    registry: Option<Arc<PinRegistry>>,
    listener: Option<ListenerHandle>,
    client: Option<Client>,
    idle_client: Option<Client>,
    replies: Vec<String>,
}

impl ScpiWorld {
    fn new() -> Self {
        Self {
            registry: None,
            listener: None,
            client: None,
            idle_client: None,
            replies: Vec::new(),
        }
    }

    fn start(&mut self, idle_timeout: Duration) {
        let registry = Arc::new(PinRegistry::new(
            PinTable::luckfox(),
            SimulatedDriver::new(),
        ));
        let listener = SocketListener::bind(&ScpiEndpoint::new("127.0.0.1", 0), 5)
            .expect("bind SCPI listener");
        let handler = Arc::new(ScpiConnectionHandler::new(
            Arc::clone(&registry),
            idle_timeout,
        ));
        self.listener = Some(listener.start(handler).expect("start SCPI listener"));
        self.registry = Some(registry);
    }

    fn registry(&self) -> &PinRegistry {
        self.registry.as_deref().expect("server should be running")
    }

    fn address(&self) -> SocketAddr {
        self.listener
            .as_ref()
            .map(ListenerHandle::local_addr)
            .expect("server should be running")
    }

    fn client(&mut self) -> &mut Client {
        let addr = self.address();
        self.client.get_or_insert_with(|| Client::connect(addr))
    }

    fn send(&mut self, command: &str) {
        let reply = self.client().send(command);
        self.replies.push(reply);
    }
}

impl Drop for ScpiWorld {
    fn drop(&mut self) {
        if let Some(handle) = self.listener.take() {
            handle.shutdown();
            let _ = handle.join();
        }
    }
}

#[fixture]
fn world() -> RefCell<ScpiWorld> {
    RefCell::new(ScpiWorld::new())
}

#[given("an SCPI server with no pins set up")]
fn given_empty_server(world: &RefCell<ScpiWorld>) {
    world.borrow_mut().start(CLIENT_TIMEOUT);
}

#[given("an SCPI server with pin {pin} set up as an output")]
fn given_server_with_pin(world: &RefCell<ScpiWorld>, pin: PinId) {
    world.borrow_mut().start(CLIENT_TIMEOUT);
    world
        .borrow()
        .registry()
        .setup(pin, Direction::Out)
        .expect("set pin up");
}

#[given("an SCPI server with a short idle timeout")]
fn given_short_timeout_server(world: &RefCell<ScpiWorld>) {
    world.borrow_mut().start(SHORT_IDLE_TIMEOUT);
}

#[when("a client sends \"{command}\"")]
fn when_client_sends(world: &RefCell<ScpiWorld>, command: String) {
    world.borrow_mut().send(command.trim_matches('"'));
}

#[when("the client sends \"{command}\"")]
fn when_same_client_sends(world: &RefCell<ScpiWorld>, command: String) {
    world.borrow_mut().send(command.trim_matches('"'));
}

#[when("a client splits \"{head}\" and \"{tail}\" across two writes")]
fn when_client_splits(world: &RefCell<ScpiWorld>, head: String, tail: String) {
    let mut world = world.borrow_mut();
    let client = world.client();
    client.write_raw(head.trim_matches('"').as_bytes());
    thread::sleep(Duration::from_millis(50));
    client.write_raw(format!("{}\n", tail.trim_matches('"')).as_bytes());
    let reply = client.read_line();
    world.replies.push(reply);
}

#[when("{count} clients each toggle pin {pin} once")]
fn when_clients_toggle(world: &RefCell<ScpiWorld>, count: usize, pin: PinId) {
    let addr = world.borrow().address();
    let workers: Vec<_> = (0..count)
        .map(|_| {
            thread::spawn(move || {
                let mut client = Client::connect(addr);
                client.send(&format!("GPIO:TOGGLE {pin}"))
            })
        })
        .collect();
    for worker in workers {
        let reply = worker.join().expect("toggle client panicked");
        assert!(reply == "0" || reply == "1", "unexpected toggle reply {reply:?}");
    }
}

#[when("an idle client connects and sends nothing")]
fn when_idle_client_connects(world: &RefCell<ScpiWorld>) {
    let addr = world.borrow().address();
    world.borrow_mut().idle_client = Some(Client::connect(addr));
}

#[then("the replies are \"{replies}\"")]
fn then_replies_are(world: &RefCell<ScpiWorld>, replies: String) {
    let expected: Vec<String> = replies
        .trim_matches('"')
        .split('|')
        .map(str::to_owned)
        .collect();
    assert_eq!(world.borrow().replies, expected);
}

#[then("the error register reports code {code}")]
fn then_error_code(world: &RefCell<ScpiWorld>, code: u16) {
    let entry = world.borrow_mut().client().send("SYST:ERR?");
    let reported = entry
        .split_once(',')
        .and_then(|(value, _)| value.parse::<u16>().ok())
        .expect("error entry should start with a code");
    assert_eq!(reported, code, "unexpected entry {entry:?}");
}

#[then("pin {pin} reads {level}")]
fn then_pin_reads(world: &RefCell<ScpiWorld>, pin: PinId, level: u8) {
    let read = world.borrow().registry().read(pin).expect("read pin");
    assert_eq!(u8::from(read), level);
}

#[then("the idle client is disconnected without a reply")]
fn then_idle_client_disconnected(world: &RefCell<ScpiWorld>) {
    let mut idle = world
        .borrow_mut()
        .idle_client
        .take()
        .expect("idle client should be connected");
    assert_eq!(idle.read_line(), "", "server should close without replying");
}

#[then("a new client still receives replies")]
fn then_new_client_served(world: &RefCell<ScpiWorld>) {
    let addr = world.borrow().address();
    let mut client = Client::connect(addr);
    assert_eq!(client.send("*IDN?"), IDENTITY);
}

#[scenario(path = "tests/features/scpi_write_read.feature")]
fn scpi_write_then_read(#[from(world)] world: RefCell<ScpiWorld>) {
    drop(world);
}

#[scenario(path = "tests/features/scpi_split_line.feature")]
fn scpi_split_line(#[from(world)] world: RefCell<ScpiWorld>) {
    drop(world);
}

#[scenario(path = "tests/features/scpi_status.feature")]
fn scpi_status(#[from(world)] world: RefCell<ScpiWorld>) {
    drop(world);
}

#[scenario(path = "tests/features/scpi_unknown_command.feature")]
fn scpi_unknown_command(#[from(world)] world: RefCell<ScpiWorld>) {
    drop(world);
}

#[scenario(path = "tests/features/scpi_concurrent_toggle.feature")]
fn scpi_concurrent_toggle(#[from(world)] world: RefCell<ScpiWorld>) {
    drop(world);
}

#[scenario(path = "tests/features/scpi_idle_timeout.feature")]
fn scpi_idle_timeout(#[from(world)] world: RefCell<ScpiWorld>) {
    drop(world);
}
