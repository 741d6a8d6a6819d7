#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    use cvsclient::protocol::{Command, MessageCollector, Requests};
    use cvsclient::session::NoProgress;
    use cvsclient::transport::{Connector, NoopLogger};
    use cvsclient::{ClientConfig, ClientEnvironment, CvsError, CvsRoot, RequestProcessor};

    /// Read lines until one equals `last`; returns them all.
    fn read_until(reader: &mut BufReader<TcpStream>, last: &str) -> Vec<String> {
        let mut lines = Vec::new();
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).unwrap() == 0 {
                return lines;
            }
            let line = line.trim_end_matches('\n').to_string();
            let done = line == last;
            lines.push(line);
            if done {
                return lines;
            }
        }
    }

    /// A minimal pserver that accepts one client and answers `version`.
    fn fake_server(auth_reply: &'static str) -> (u16, thread::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut writer = stream;

            let mut seen = read_until(&mut reader, "END AUTH REQUEST");
            writer.write_all(auth_reply.as_bytes()).unwrap();
            if auth_reply != "I LOVE YOU\n" {
                return seen;
            }

            seen.extend(read_until(&mut reader, "valid-requests"));
            writer
                .write_all(
                    b"Valid-requests Root Valid-responses valid-requests UseUnchanged version\nok\n",
                )
                .unwrap();

            seen.extend(read_until(&mut reader, "version"));
            writer
                .write_all(b"M Concurrent Versions System (CVS) 1.12.13 (client/server)\nok\n")
                .unwrap();
            seen
        });
        (port, handle)
    }

    fn processor(port: u16) -> RequestProcessor {
        let root: CvsRoot = format!(":pserver:anon:anoncvs@127.0.0.1:{}/cvsroot", port)
            .parse()
            .unwrap();
        let config = ClientConfig {
            connect_timeout_secs: 5,
            ..ClientConfig::default()
        };
        RequestProcessor::new(
            Connector::new(root, config.clone()),
            ClientEnvironment::new(config).with_logger(NoopLogger),
        )
    }

    #[test]
    fn test_version_over_pserver() -> anyhow::Result<()> {
        let (port, server) = fake_server("I LOVE YOU\n");
        let mut output = MessageCollector::default();

        let ok = processor(port).process_requests(
            &Requests::new(Command::Version),
            &mut output,
            &mut NoProgress,
        )?;

        assert!(ok);
        assert_eq!(
            output.messages,
            vec!["Concurrent Versions System (CVS) 1.12.13 (client/server)"]
        );

        let seen = server.join().unwrap();
        assert_eq!(
            &seen[..5],
            &[
                "BEGIN AUTH REQUEST",
                "/cvsroot",
                "anon",
                "Ay=0=h<Z",
                "END AUTH REQUEST"
            ]
        );
        assert_eq!(seen[5], "valid-requests");
        assert_eq!(seen[6], "Root /cvsroot");
        assert_eq!(seen.last().map(String::as_str), Some("version"));
        Ok(())
    }

    #[test]
    fn test_rejected_password() {
        let (port, server) = fake_server("I HATE YOU\n");

        let err = processor(port)
            .process_requests(
                &Requests::new(Command::Version),
                &mut MessageCollector::default(),
                &mut NoProgress,
            )
            .unwrap_err();

        assert!(matches!(err, CvsError::Authentication(_)));
        server.join().unwrap();
    }
}
