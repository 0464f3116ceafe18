use core::fmt;
use std::{
    any::Any,
    cell::RefCell,
    io::{self, BufRead, BufReader, Write},
    rc::Rc,
};

use crate::value::PortRef;

// Text ports over anything that reads or writes bytes
pub trait Writeable: Write + Any {}
impl<T: Write + Any> Writeable for T {}

/// Output port
///
/// The inner handle is shared, so a caller can keep a clone of whatever it
/// redirected output into and inspect it afterwards.
#[derive(Clone)]
pub struct OutputPort {
    pub port: Option<Rc<RefCell<dyn Writeable>>>,
}

impl<T: Writeable> From<Rc<RefCell<T>>> for OutputPort {
    fn from(port: Rc<RefCell<T>>) -> Self {
        Self { port: Some(port) }
    }
}

impl fmt::Debug for OutputPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<output port>")
    }
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "port was closed")
}

fn busy() -> io::Error {
    io::Error::new(io::ErrorKind::WouldBlock, "output port is already in use")
}

impl Write for OutputPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let port = self.port.as_ref().ok_or_else(closed)?;
        let mut writer = port.try_borrow_mut().map_err(|_| busy())?;
        // Text ports only ever carry UTF-8
        let text = String::from_utf8_lossy(buf);
        writer.write_all(text.as_bytes())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let port = self.port.as_ref().ok_or_else(closed)?;
        port.try_borrow_mut().map_err(|_| busy())?.flush()
    }
}

pub trait Readable: BufRead + Any {}
impl<T: BufRead + Any> Readable for T {}

/// Input port, read a line at a time
#[derive(Clone)]
pub struct InputPort {
    pub port: Option<Rc<RefCell<dyn Readable>>>,
}

impl InputPort {
    /// The next line without its terminator, or `None` at end of input
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        let port = self.port.as_ref().ok_or_else(closed)?;
        let mut line = String::new();
        if port.borrow_mut().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(Some(line))
    }
}

impl<T: Readable> From<Rc<RefCell<T>>> for InputPort {
    fn from(port: Rc<RefCell<T>>) -> Self {
        Self { port: Some(port) }
    }
}

impl fmt::Debug for InputPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<input port>")
    }
}

/// The interpreter's open ports. Ports are never collected, only closed.
#[derive(Debug)]
pub struct Ports {
    inputs: Vec<InputPort>,
    outputs: Vec<OutputPort>,
}

impl Ports {
    pub const STDIN: PortRef = PortRef(0);
    pub const STDOUT: PortRef = PortRef(0);
    pub const STDERR: PortRef = PortRef(1);

    /// Standard input, output and error of the process
    pub fn standard() -> Self {
        Self {
            inputs: vec![Rc::new(RefCell::new(BufReader::new(io::stdin()))).into()],
            outputs: vec![
                Rc::new(RefCell::new(io::stdout())).into(),
                Rc::new(RefCell::new(io::stderr())).into(),
            ],
        }
    }

    pub fn input(&mut self, port: PortRef) -> &mut InputPort {
        &mut self.inputs[port.index()]
    }

    pub fn output(&mut self, port: PortRef) -> &mut OutputPort {
        &mut self.outputs[port.index()]
    }

    pub fn set_input(&mut self, port: PortRef, input: InputPort) {
        self.inputs[port.index()] = input;
    }

    pub fn set_output(&mut self, port: PortRef, output: OutputPort) {
        self.outputs[port.index()] = output;
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, io::Write, rc::Rc};

    use assert2::{check, let_assert};

    use super::{InputPort, OutputPort, Ports};

    #[test]
    fn output_is_shared_with_the_caller() {
        let buffer = Rc::new(RefCell::new(Vec::<u8>::new()));
        let mut port = OutputPort::from(buffer.clone());
        check!(write!(port, "hello {}", 1).is_ok());
        check!(buffer.borrow().as_slice() == b"hello 1");

        port.port = None;
        check!(port.write(b"x").is_err());
        check!(port.flush().is_err());
    }

    #[test]
    fn a_port_in_use_refuses_writes_and_flushes() {
        let buffer = Rc::new(RefCell::new(Vec::<u8>::new()));
        let mut port = OutputPort::from(buffer.clone());
        let held = buffer.borrow_mut();
        let_assert!(Err(err) = port.flush());
        check!(err.kind() == std::io::ErrorKind::WouldBlock);
        let_assert!(Err(err) = port.write(b"x"));
        check!(err.kind() == std::io::ErrorKind::WouldBlock);
        drop(held);
        check!(port.flush().is_ok());
    }

    #[test]
    fn lines_lose_their_terminators() {
        let text = std::io::Cursor::new(b"one\r\ntwo\nthree".to_vec());
        let mut port = InputPort::from(Rc::new(RefCell::new(text)));
        let_assert!(Ok(Some(one)) = port.read_line());
        check!(one == "one");
        let_assert!(Ok(Some(two)) = port.read_line());
        check!(two == "two");
        let_assert!(Ok(Some(three)) = port.read_line());
        check!(three == "three");
        check!(port.read_line().ok() == Some(None));
    }

    #[test]
    fn standard_ports_are_redirectable() {
        let mut ports = Ports::standard();
        let buffer = Rc::new(RefCell::new(Vec::<u8>::new()));
        ports.set_output(Ports::STDERR, buffer.clone().into());
        check!(ports.output(Ports::STDERR).write_all(b"oops").is_ok());
        check!(buffer.borrow().as_slice() == b"oops");
    }
}
