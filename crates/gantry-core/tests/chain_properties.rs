//! Chain execution properties.

use std::sync::Arc;

use bytes::Bytes;
use gantry_core::{boxed, BoxHandler, BufferedWriter, Context, Response};
use http::StatusCode;
use parking_lot::Mutex;
use proptest::prelude::*;

type Trace = Arc<Mutex<Vec<usize>>>;

fn chain(len: usize, respond_at: Option<usize>, trace: &Trace) -> Vec<BoxHandler> {
    (0..len)
        .map(|i| {
            let trace = Arc::clone(trace);
            boxed(move |_: &mut Context<'_>| {
                trace.lock().push(i);
                (Some(i) == respond_at).then(Response::no_content)
            })
        })
        .collect()
}

fn run(chain: Vec<BoxHandler>) -> http::Response<Bytes> {
    let mut sink = BufferedWriter::new();
    let request = http::Request::builder().uri("/").body(Bytes::new()).unwrap();
    let mut ctx = Context::new(request, &mut sink).with_chain(chain);
    ctx.run();
    assert!(ctx.cursor() <= ctx.chain_len());
    drop(ctx);
    sink.into_response()
}

proptest! {
    #[test]
    fn silent_chain_renders_not_found(len in 0usize..16) {
        let trace = Trace::default();
        let out = run(chain(len, None, &trace));

        prop_assert_eq!(out.status(), StatusCode::NOT_FOUND);
        prop_assert_eq!(trace.lock().clone(), (0..len).collect::<Vec<_>>());
    }

    #[test]
    fn responder_short_circuits(len in 1usize..16, pick in any::<prop::sample::Index>()) {
        let k = pick.index(len);
        let trace = Trace::default();
        let out = run(chain(len, Some(k), &trace));

        prop_assert_eq!(out.status(), StatusCode::NO_CONTENT);
        prop_assert_eq!(trace.lock().clone(), (0..=k).collect::<Vec<_>>());
    }
}
