//! Behavioural tests for the SCPI TCP listener.

use std::cell::RefCell;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use std::time::{Duration, Instant};

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use gpio_scpi_config::ScpiEndpoint;

use crate::transport::{CountingHandler, ListenerError, ListenerHandle, SocketListener};

const BACKLOG: i32 = 5;

struct ListenerWorld {
    endpoint: ScpiEndpoint,
    listener: Option<ListenerHandle>,
    accepted: Arc<AtomicUsize>,
    bind_error: Option<ListenerError>,
    reserved: Option<TcpListener>,
    clients: Vec<TcpStream>,
}

impl ListenerWorld {
    fn new() -> Self {
        Self {
            endpoint: ScpiEndpoint::new("127.0.0.1", 0),
            listener: None,
            accepted: Arc::new(AtomicUsize::new(0)),
            bind_error: None,
            reserved: None,
            clients: Vec::new(),
        }
    }

    fn start_listener(&mut self) {
        let (count, handler) = CountingHandler::new();
        self.accepted = count;
        let started = SocketListener::bind(&self.endpoint, BACKLOG)
            .and_then(|listener| listener.start(handler));
        match started {
            Ok(handle) => self.listener = Some(handle),
            Err(error) => self.bind_error = Some(error),
        }
    }

    fn reserve_port(&mut self) {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind reserved port");
        let port = listener.local_addr().expect("local addr").port();
        self.endpoint = ScpiEndpoint::new("127.0.0.1", port);
        self.reserved = Some(listener);
    }

    fn address(&self) -> SocketAddr {
        self.listener
            .as_ref()
            .map(ListenerHandle::local_addr)
            .expect("listener should be running")
    }

    fn connect_clients(&mut self, count: usize) {
        let addr = self.address();
        for _ in 0..count {
            let client = TcpStream::connect(addr).expect("connect client");
            self.clients.push(client);
        }
    }

    fn wait_for_connections(&self, expected: usize) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if self.accepted.load(Ordering::SeqCst) >= expected {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }
}

impl Drop for ListenerWorld {
    fn drop(&mut self) {
        if let Some(handle) = self.listener.take() {
            handle.shutdown();
            let _ = handle.join();
        }
        self.reserved = None;
    }
}

#[fixture]
fn world() -> RefCell<ListenerWorld> {
    RefCell::new(ListenerWorld::new())
}

#[given("an SCPI listener is running on an ephemeral port")]
fn given_listener(world: &RefCell<ListenerWorld>) {
    world.borrow_mut().start_listener();
    assert!(
        world.borrow().bind_error.is_none(),
        "listener start failed: {:?}",
        world.borrow().bind_error
    );
}

#[given("another process already holds the SCPI port")]
fn given_port_in_use(world: &RefCell<ListenerWorld>) {
    world.borrow_mut().reserve_port();
}

#[when("{count} clients connect to the listener")]
fn when_clients_connect(world: &RefCell<ListenerWorld>, count: usize) {
    world.borrow_mut().connect_clients(count);
}

#[when("the SCPI listener starts on that port")]
fn when_listener_starts_on_port(world: &RefCell<ListenerWorld>) {
    world.borrow_mut().start_listener();
}

#[then("the listener hands off {count} connections")]
fn then_listener_hands_off(world: &RefCell<ListenerWorld>, count: usize) {
    assert!(
        world.borrow().wait_for_connections(count),
        "expected {count} connections, got {}",
        world.borrow().accepted.load(Ordering::SeqCst)
    );
}

#[then("binding the SCPI port fails")]
fn then_binding_fails(world: &RefCell<ListenerWorld>) {
    let world = world.borrow();
    assert!(
        matches!(world.bind_error, Some(ListenerError::BindTcp { .. })),
        "expected a bind failure, got {:?}",
        world.bind_error
    );
}

#[scenario(path = "tests/features/listener_accepts.feature")]
fn listener_accepts_clients(#[from(world)] world: RefCell<ListenerWorld>) {
    drop(world);
}

#[scenario(path = "tests/features/listener_port_in_use.feature")]
fn listener_port_in_use(#[from(world)] world: RefCell<ListenerWorld>) {
    drop(world);
}
