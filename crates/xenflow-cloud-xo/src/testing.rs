//! Scripted transport for unit tests

use crate::error::{Result, XoError};
use crate::rpc::{RpcTransport, TransportFactory};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

#[derive(Clone)]
enum Reply {
    Ok(Value),
    Err(i64, String),
    Hang,
}

#[derive(Default)]
struct Script {
    replies: HashMap<String, VecDeque<Reply>>,
    refuse_connect: Option<String>,
}

impl Script {
    /// Pop queued replies in order; the last one repeats
    fn next(&mut self, method: &str) -> Option<Reply> {
        let queue = self.replies.get_mut(method)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[derive(Default)]
struct LogInner {
    calls: Vec<(String, Value)>,
    connects: usize,
    closes: usize,
}

/// What the fake transports saw, shared across every transport of a script
#[derive(Clone, Default)]
pub(crate) struct CallLog(Arc<Mutex<LogInner>>);

impl CallLog {
    pub(crate) fn methods(&self) -> Vec<String> {
        self.0.lock().unwrap().calls.iter().map(|(m, _)| m.clone()).collect()
    }

    pub(crate) fn params(&self, index: usize) -> Value {
        self.0.lock().unwrap().calls[index].1.clone()
    }

    pub(crate) fn connects(&self) -> usize {
        self.0.lock().unwrap().connects
    }

    pub(crate) fn closes(&self) -> usize {
        self.0.lock().unwrap().closes
    }
}

pub(crate) struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
    log: CallLog,
    connected: bool,
}

impl ScriptedTransport {
    #[allow(clippy::new_ret_no_self)]
    pub(crate) fn new() -> ScriptBuilder {
        ScriptBuilder::default()
    }
}

#[derive(Default)]
pub(crate) struct ScriptBuilder {
    script: Script,
}

impl ScriptBuilder {
    pub(crate) fn reply(mut self, method: &str, result: Value) -> Self {
        self.push(method, Reply::Ok(result));
        self
    }

    pub(crate) fn fail(mut self, method: &str, code: i64, message: &str) -> Self {
        self.push(method, Reply::Err(code, message.to_string()));
        self
    }

    /// The call never completes
    pub(crate) fn hang(mut self, method: &str) -> Self {
        self.push(method, Reply::Hang);
        self
    }

    pub(crate) fn refuse_connect(mut self, message: &str) -> Self {
        self.script.refuse_connect = Some(message.to_string());
        self
    }

    fn push(&mut self, method: &str, reply: Reply) {
        self.script
            .replies
            .entry(method.to_string())
            .or_default()
            .push_back(reply);
    }

    pub(crate) fn build(self) -> (Box<dyn RpcTransport>, CallLog) {
        let log = CallLog::default();
        let transport = ScriptedTransport {
            script: Arc::new(Mutex::new(self.script)),
            log: log.clone(),
            connected: false,
        };
        (Box::new(transport), log)
    }

    pub(crate) fn factory(self) -> (Arc<ScriptedFactory>, CallLog) {
        let log = CallLog::default();
        let factory = ScriptedFactory {
            script: Arc::new(Mutex::new(self.script)),
            log: log.clone(),
        };
        (Arc::new(factory), log)
    }
}

pub(crate) struct ScriptedFactory {
    script: Arc<Mutex<Script>>,
    log: CallLog,
}

impl TransportFactory for ScriptedFactory {
    fn create(&self) -> Box<dyn RpcTransport> {
        Box::new(ScriptedTransport {
            script: Arc::clone(&self.script),
            log: self.log.clone(),
            connected: false,
        })
    }
}

#[async_trait]
impl RpcTransport for ScriptedTransport {
    async fn connect(&mut self) -> Result<()> {
        self.log.0.lock().unwrap().connects += 1;
        if let Some(message) = self.script.lock().unwrap().refuse_connect.clone() {
            return Err(XoError::Connect(message));
        }
        self.connected = true;
        Ok(())
    }

    async fn call(&mut self, method: &str, params: Value) -> Result<Value> {
        if !self.connected {
            return Err(XoError::Connect("not connected".to_string()));
        }
        self.log
            .0
            .lock()
            .unwrap()
            .calls
            .push((method.to_string(), params));

        let reply = self.script.lock().unwrap().next(method);
        match reply {
            Some(Reply::Ok(value)) => Ok(value),
            Some(Reply::Err(code, message)) => Err(XoError::Rpc { code, message }),
            Some(Reply::Hang) => std::future::pending().await,
            None => Err(XoError::Rpc {
                code: -32601,
                message: format!("method not found: {}", method),
            }),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.log.0.lock().unwrap().closes += 1;
        self.connected = false;
        Ok(())
    }
}
