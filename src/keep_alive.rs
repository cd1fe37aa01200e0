use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::time::Duration;

const READ_TIMEOUT: Duration = Duration::from_secs(2);
const MAX_REQUEST_HEAD: usize = 8 * 1024;

const RESPONSE: &str = "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok";

/// Answers every connection on `port` with `200 OK` so hosting platforms see the bot as alive.
pub fn keep_alive(port: u16) -> std::io::Result<()> {
   let listener = TcpListener::bind(("0.0.0.0", port))?;
   log::info!("Keep-alive listening on port {}", port);

   std::thread::spawn(move || serve(listener));

   Ok(())
}

fn serve(listener: TcpListener) {
   for stream in listener.incoming() {
      match stream {
         Ok(stream) => {
            if let Err(e) = respond(stream) {
               log::debug!("Keep-alive response failed: {}", e);
            }
         }
         Err(e) => log::warn!("Keep-alive accept failed: {}", e),
      }
   }
}

/// Drains the request head before answering; closing with unread input resets the connection.
fn respond(mut stream: TcpStream) -> std::io::Result<()> {
   stream.set_read_timeout(Some(READ_TIMEOUT))?;

   let mut head = Vec::new();
   let mut buf = [0_u8; 1024];
   while !head.windows(4).any(|w| w == b"\r\n\r\n") && head.len() < MAX_REQUEST_HEAD {
      match stream.read(&mut buf) {
         Ok(0) => break,
         Ok(n) => head.extend_from_slice(&buf[..n]),
         Err(e) if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) => break,
         Err(e) => return Err(e),
      }
   }

   stream.write_all(RESPONSE.as_bytes())?;
   stream.shutdown(Shutdown::Write)
}
