use std::io::{Read, Write};

use wire::codec_sync::{read_data_default, read_string, read_u64, read_u8, write_data, write_u64, write_u8};
use wire::{tags, Data, ObjectId, WireError, WireResult};

use crate::error::EngineError;
use crate::evaluator::Evaluator;
use crate::store::EngineStore;

/// A decoded, just-executed command's outcome: either a reply payload, or an engine-level
/// failure to be encoded as a `0x02` reply. Distinct from a framing-level [`WireError`], which
/// terminates the loop instead of producing a reply.
enum Outcome {
    Ok(Data),
    Err(EngineError),
}

/// The engine-side half of the bridge (C2): reads one command per iteration, dispatches it to
/// the [`Evaluator`], and writes exactly one reply before reading the next command.
///
/// `R`/`W` are the blocking halves of the engine's stdin/stdout-equivalent pipes; `E` is the
/// pluggable interpreter. Mirrors the single-threaded, read-dispatch-reply discipline of
/// `AmConnCore`'s request/reply pairing, but on one thread rather than behind a mutex, since the
/// engine process has no concurrent callers of its own.
pub struct EngineLoop<E: Evaluator, R: Read, W: Write> {
    evaluator: E,
    store: EngineStore,
    input: R,
    output: W,
}

impl<E: Evaluator, R: Read, W: Write> std::fmt::Debug for EngineLoop<E, R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineLoop").field("store", &self.store).finish_non_exhaustive()
    }
}

impl<E: Evaluator, R: Read, W: Write> EngineLoop<E, R, W> {
    pub fn new(evaluator: E, input: R, output: W) -> Self {
        Self {
            evaluator,
            store: EngineStore::new(),
            input,
            output,
        }
    }

    #[must_use]
    pub fn store(&self) -> &EngineStore {
        &self.store
    }

    /// Runs the loop until the input stream reaches a clean end-of-file between commands (no
    /// partial frame), which is treated as an ordinary shutdown. A partial frame, or any other
    /// I/O failure, is propagated as a fatal [`WireError`].
    pub fn run(&mut self) -> WireResult<()> {
        loop {
            let seq = match read_u64(&mut self.input) {
                Ok(seq) => seq,
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    debug!("engine loop: clean shutdown at end of input");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };
            let tag = read_u8(&mut self.input)?;
            trace!("engine loop: seq={seq} tag={tag:#04x}");
            let outcome = self.dispatch(tag)?;
            self.reply(seq, outcome)?;
        }
    }

    fn dispatch(&mut self, tag: u8) -> WireResult<Outcome> {
        match tag {
            tags::CMD_EVAL_CODE => {
                let code = read_string(&mut self.input, wire::DEFAULT_MAX_STRING_LEN)?;
                Ok(match self.evaluator.eval_effect(&code) {
                    Ok(()) => Outcome::Ok(Data::unit()),
                    Err(e) => Outcome::Err(e),
                })
            }
            tags::CMD_STORE_EXPR => {
                let code = read_string(&mut self.input, wire::DEFAULT_MAX_STRING_LEN)?;
                Ok(match self.evaluator.eval_store(&code) {
                    Ok(value) => {
                        let id = self.store.insert(value);
                        Outcome::Ok(Data::Object(id))
                    }
                    Err(e) => Outcome::Err(e),
                })
            }
            tags::CMD_APPLY => {
                let function_id = ObjectId::new(read_u64(&mut self.input)?);
                let argument = read_data_default(&mut self.input)?;
                Ok(self.apply(function_id, argument))
            }
            tags::CMD_REMOVE => {
                let ids = read_data_default(&mut self.input)?;
                Ok(self.remove(&ids))
            }
            other => Err(WireError::UnknownCommandTag(other)),
        }
    }

    fn apply(&mut self, function_id: ObjectId, argument: Data) -> Outcome {
        let function = match self.store.get(function_id) {
            Ok(value) => value.clone(),
            Err(e) => return Outcome::Err(e),
        };
        if function.as_closure().is_none() {
            return Outcome::Err(EngineError::NotAFunction(function_id, function.kind_name()));
        }
        match self.evaluator.apply(&function, argument, &mut self.store) {
            Ok(data) => Outcome::Ok(data),
            Err(e) => Outcome::Err(e),
        }
    }

    fn remove(&mut self, ids: &Data) -> Outcome {
        let Some(items) = ids.as_list() else {
            return Outcome::Err(EngineError::Shape(format!(
                "Remove expects a List of Int, got {}",
                ids.kind_name()
            )));
        };
        let mut parsed = Vec::with_capacity(items.len());
        for item in items {
            let Some(raw) = item.as_int() else {
                return Outcome::Err(EngineError::Shape(format!(
                    "Remove expects a List of Int, found a {}",
                    item.kind_name()
                )));
            };
            parsed.push(ObjectId::new(raw as u64));
        }
        for id in parsed {
            if let Err(e) = self.store.remove(id) {
                return Outcome::Err(e);
            }
        }
        Outcome::Ok(Data::unit())
    }

    fn reply(&mut self, seq: u64, outcome: Outcome) -> WireResult<()> {
        write_u64(&mut self.output, seq)?;
        match outcome {
            Outcome::Ok(data) => {
                write_u8(&mut self.output, tags::REPLY_OK)?;
                write_data(&mut self.output, &data)?;
            }
            Outcome::Err(e) => {
                warn!("engine loop: seq={seq} failed: {e}");
                write_u8(&mut self.output, tags::REPLY_ERR)?;
                wire::codec_sync::write_string(&mut self.output, &e.to_string())?;
            }
        }
        self.output.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exn::{ApplyConvention, ExnValue};
    use std::io::Cursor;
    use std::rc::Rc;
    use wire::codec_sync::{read_string, write_data, write_string, write_u64, write_u8};

    struct StubEvaluator;

    impl Evaluator for StubEvaluator {
        fn eval_effect(&mut self, code: &str) -> Result<(), EngineError> {
            if code == "fail" {
                Err(EngineError::Eval("boom".into()))
            } else {
                Ok(())
            }
        }

        fn eval_store(&mut self, code: &str) -> Result<ExnValue, EngineError> {
            if code == "double" {
                Ok(ExnValue::Closure(
                    Rc::new(|v| match v {
                        ExnValue::Int(i) => Ok(ExnValue::Int(i * 2)),
                        _ => Err(EngineError::Shape("expected int".into())),
                    }),
                    ApplyConvention::Structural,
                ))
            } else {
                Ok(ExnValue::Int(code.parse().unwrap_or(0)))
            }
        }

        fn apply(&mut self, function: &ExnValue, argument: Data, _store: &mut EngineStore) -> Result<Data, EngineError> {
            let (f, _) = function.as_closure().expect("checked by the loop");
            let input = argument.as_int().ok_or_else(|| EngineError::Shape("expected int".into()))?;
            match f(ExnValue::Int(input))? {
                ExnValue::Int(i) => Ok(Data::Int(i)),
                other => Err(EngineError::Shape(format!("unexpected {}", other.kind_name()))),
            }
        }
    }

    fn frame_eval_code(seq: u64, code: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        write_u64(&mut buf, seq).unwrap();
        write_u8(&mut buf, tags::CMD_EVAL_CODE).unwrap();
        write_string(&mut buf, code).unwrap();
        buf
    }

    fn frame_store_expr(seq: u64, code: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        write_u64(&mut buf, seq).unwrap();
        write_u8(&mut buf, tags::CMD_STORE_EXPR).unwrap();
        write_string(&mut buf, code).unwrap();
        buf
    }

    fn frame_apply(seq: u64, function_id: u64, argument: &Data) -> Vec<u8> {
        let mut buf = Vec::new();
        write_u64(&mut buf, seq).unwrap();
        write_u8(&mut buf, tags::CMD_APPLY).unwrap();
        write_u64(&mut buf, function_id).unwrap();
        write_data(&mut buf, argument).unwrap();
        buf
    }

    #[test]
    fn eval_code_replies_ok_with_unit() {
        let input = Cursor::new(frame_eval_code(1, "noop"));
        let mut output = Vec::new();
        let mut loop_ = EngineLoop::new(StubEvaluator, input, &mut output);
        loop_.run().unwrap();

        let mut cursor = Cursor::new(output);
        assert_eq!(read_u64(&mut cursor).unwrap(), 1);
        assert_eq!(read_u8(&mut cursor).unwrap(), tags::REPLY_OK);
        assert_eq!(read_data_default(&mut cursor).unwrap(), Data::unit());
    }

    #[test]
    fn eval_code_failure_replies_err_and_continues() {
        let mut input = frame_eval_code(1, "fail");
        input.extend(frame_eval_code(2, "noop"));
        let mut output = Vec::new();
        let mut loop_ = EngineLoop::new(StubEvaluator, Cursor::new(input), &mut output);
        loop_.run().unwrap();

        let mut cursor = Cursor::new(output);
        assert_eq!(read_u64(&mut cursor).unwrap(), 1);
        assert_eq!(read_u8(&mut cursor).unwrap(), tags::REPLY_ERR);
        let msg = read_string(&mut cursor, wire::DEFAULT_MAX_STRING_LEN).unwrap();
        assert_eq!(msg, "boom");
        assert_eq!(read_u64(&mut cursor).unwrap(), 2);
        assert_eq!(read_u8(&mut cursor).unwrap(), tags::REPLY_OK);
    }

    #[test]
    fn store_then_apply_round_trips_through_the_store() {
        let mut input = frame_store_expr(1, "double");
        input.extend(frame_apply(2, 0, &Data::Int(21)));
        let mut output = Vec::new();
        let mut loop_ = EngineLoop::new(StubEvaluator, Cursor::new(input), &mut output);
        loop_.run().unwrap();

        let mut cursor = Cursor::new(output);
        assert_eq!(read_u64(&mut cursor).unwrap(), 1);
        assert_eq!(read_u8(&mut cursor).unwrap(), tags::REPLY_OK);
        assert_eq!(read_data_default(&mut cursor).unwrap(), Data::Object(ObjectId::new(0)));
        assert_eq!(read_u64(&mut cursor).unwrap(), 2);
        assert_eq!(read_u8(&mut cursor).unwrap(), tags::REPLY_OK);
        assert_eq!(read_data_default(&mut cursor).unwrap(), Data::Int(42));
    }

    #[test]
    fn apply_unknown_function_id_is_recoverable() {
        let input = frame_apply(1, 999, &Data::Int(1));
        let mut output = Vec::new();
        let mut loop_ = EngineLoop::new(StubEvaluator, Cursor::new(input), &mut output);
        loop_.run().unwrap();

        let mut cursor = Cursor::new(output);
        assert_eq!(read_u64(&mut cursor).unwrap(), 1);
        assert_eq!(read_u8(&mut cursor).unwrap(), tags::REPLY_ERR);
        let msg = read_string(&mut cursor, wire::DEFAULT_MAX_STRING_LEN).unwrap();
        assert_eq!(msg, "no object #999");
    }

    #[test]
    fn remove_unknown_id_is_recoverable_and_session_continues() {
        let mut input = frame_apply(100, 0, &Data::unit());
        // seq 100 will fail with NoSuchObject since nothing was stored; loop must still
        // process the following command.
        let mut buf = Vec::new();
        write_u64(&mut buf, 2).unwrap();
        write_u8(&mut buf, tags::CMD_REMOVE).unwrap();
        write_data(&mut buf, &Data::List(vec![Data::Int(0)])).unwrap();
        input.extend(buf);

        let mut output = Vec::new();
        let mut loop_ = EngineLoop::new(StubEvaluator, Cursor::new(input), &mut output);
        loop_.run().unwrap();

        let mut cursor = Cursor::new(output);
        assert_eq!(read_u64(&mut cursor).unwrap(), 100);
        assert_eq!(read_u8(&mut cursor).unwrap(), tags::REPLY_ERR);
        let _ = read_string(&mut cursor, wire::DEFAULT_MAX_STRING_LEN).unwrap();
        assert_eq!(read_u64(&mut cursor).unwrap(), 2);
        assert_eq!(read_u8(&mut cursor).unwrap(), tags::REPLY_ERR);
    }
}
