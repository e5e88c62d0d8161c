//! Line protocol between the driver and an application process.
//!
//! Each message is one JSON object on its own line, tagged by `type`.
//! Requests carry an `id` that the matching reply echoes. The application
//! handles requests strictly in order, which is what lets a values read
//! observe every earlier update.

use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};

use super::AppConnection;
use super::local::LocalApp;
use super::types::{AppResult, InputAssignment, LaunchOptions, ValueReport};

/// Driver → application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    SetInputs { id: u64, inputs: Vec<InputAssignment> },
    GetValues { id: u64 },
    Shutdown,
}

/// Application → driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Ready,
    Applied {
        id: u64,
        values: ValueReport,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        unbound: Vec<String>,
    },
    Values {
        id: u64,
        values: ValueReport,
    },
    Error {
        #[serde(default)]
        id: Option<u64>,
        message: String,
    },
}

impl Response {
    pub fn id(&self) -> Option<u64> {
        match self {
            Response::Ready => None,
            Response::Applied { id, .. } | Response::Values { id, .. } => Some(*id),
            Response::Error { id, .. } => *id,
        }
    }
}

/// Write one message followed by a newline
pub fn send<W: Write, T: Serialize>(writer: &mut W, message: &T) -> AppResult<()> {
    serde_json::to_writer(&mut *writer, message)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Serve an in-process application over the line protocol until shutdown or EOF
pub fn serve<R: BufRead, W: Write>(app: &mut LocalApp, reader: R, mut writer: W) -> AppResult<()> {
    let options = LaunchOptions::from_env();
    app.start(&options)?;
    send(&mut writer, &Response::Ready)?;

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let request: Request = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                send(
                    &mut writer,
                    &Response::Error {
                        id: None,
                        message: format!("invalid request: {}", err),
                    },
                )?;
                continue;
            }
        };

        let response = match request {
            Request::SetInputs { id, inputs } => match app.apply_inputs(&inputs, None) {
                Ok(report) => Response::Applied {
                    id,
                    values: report.values.unwrap_or_default(),
                    unbound: report.unbound,
                },
                Err(err) => Response::Error {
                    id: Some(id),
                    message: err.to_string(),
                },
            },
            Request::GetValues { id } => match app.values() {
                Ok(values) => Response::Values { id, values },
                Err(err) => Response::Error {
                    id: Some(id),
                    message: err.to_string(),
                },
            },
            Request::Shutdown => break,
        };
        send(&mut writer, &response)?;
    }

    app.close()
}

/// Serve on this process's stdin/stdout
pub fn serve_stdio(mut app: LocalApp) -> AppResult<()> {
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    serve(&mut app, stdin.lock(), stdout.lock()).map_err(|err| {
        tracing::error!(error = %err, "application server stopped");
        err
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;

    fn run(app: &mut LocalApp, requests: &[Request]) -> Vec<Response> {
        let mut input = Vec::new();
        for request in requests {
            send(&mut input, request).unwrap();
        }
        let mut output = Vec::new();
        serve(app, Cursor::new(input), &mut output).unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_wire_format() {
        let request = Request::SetInputs {
            id: 1,
            inputs: vec![InputAssignment::new("n", 4)],
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({ "type": "set_inputs", "id": 1, "inputs": [{ "name": "n", "value": 4 }] })
        );
        let ready: Response = serde_json::from_str(r#"{"type":"ready"}"#).unwrap();
        assert_eq!(ready, Response::Ready);
    }

    #[test]
    fn test_serve_answers_in_order() {
        let mut app = LocalApp::new("echo")
            .input("n", 0)
            .output("n", |ctx| Ok::<_, String>(ctx.input_i64("n").unwrap_or(0)));
        let responses = run(
            &mut app,
            &[
                Request::SetInputs {
                    id: 1,
                    inputs: vec![InputAssignment::new("n", 5), InputAssignment::new("x", 1)],
                },
                Request::GetValues { id: 2 },
                Request::Shutdown,
                Request::GetValues { id: 3 },
            ],
        );

        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0], Response::Ready);
        match &responses[1] {
            Response::Applied { id, values, unbound } => {
                assert_eq!(*id, 1);
                assert_eq!(values.values.output["n"], json!(5));
                assert_eq!(unbound, &vec!["x".to_string()]);
            }
            other => panic!("unexpected response: {:?}", other),
        }
        assert_eq!(responses[2].id(), Some(2));
    }

    #[test]
    fn test_invalid_request_reports_error() {
        let mut app = LocalApp::new("empty");
        let mut output = Vec::new();
        serve(&mut app, Cursor::new(b"not json\n".to_vec()), &mut output).unwrap();
        let lines: Vec<Response> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert!(matches!(&lines[1], Response::Error { id: None, .. }));
    }
}
