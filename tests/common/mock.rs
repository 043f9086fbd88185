use std::cell::RefCell;
use std::rc::Rc;

use microqtt::Transport;

/// Everything the client asked the transport to do, shared with the test
/// through an `Rc` so it stays inspectable after the client takes ownership
/// of the transport.
#[derive(Debug, Default)]
pub struct MockState {
    pub started: Option<(String, u16)>,
    pub sent: Vec<Vec<u8>>,
    pub closed: usize,
    pub now: u64,
    pub fail_start: bool,
    pub fail_send: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockError;

#[derive(Default)]
pub struct MockTransport {
    pub state: Rc<RefCell<MockState>>,
}

impl MockTransport {
    pub fn new() -> (Self, Rc<RefCell<MockState>>) {
        let state = Rc::new(RefCell::new(MockState::default()));
        let transport = Self {
            state: Rc::clone(&state),
        };
        (transport, state)
    }
}

impl Transport for MockTransport {
    type Error = MockError;

    fn start(&mut self, host: &str, port: u16) -> Result<(), MockError> {
        let mut state = self.state.borrow_mut();
        if state.fail_start {
            return Err(MockError);
        }
        state.started = Some((host.to_owned(), port));
        Ok(())
    }

    fn send(&mut self, data: &[u8]) -> Result<(), MockError> {
        let mut state = self.state.borrow_mut();
        if state.fail_send {
            return Err(MockError);
        }
        state.sent.push(data.to_vec());
        Ok(())
    }

    fn close(&mut self) -> Result<(), MockError> {
        self.state.borrow_mut().closed += 1;
        Ok(())
    }

    fn now(&mut self) -> u64 {
        self.state.borrow().now
    }
}
