use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use anyhow::bail;
use ice_server::call::CallInfo;
use ice_server::dispatch::{DispatchTable, DispatchTarget, Dispatcher, Handler, NO_ROUTE};
use ice_server::error::RegistrationError;
use ice_server::http::request::{Method, Request};
use ice_server::http::response::Response;

const WAIT: Duration = Duration::from_secs(5);

fn request(uri: &str) -> Arc<Request> {
    Arc::new(Request::builder().method(Method::GET).uri(uri).build().unwrap())
}

fn hello() -> Handler {
    Handler::sync(|_, resp| {
        resp.set_body("Hello world!");
        Ok(())
    })
}

fn dispatcher(targets: Vec<DispatchTarget>) -> Dispatcher {
    let mut table = DispatchTable::new();
    for (id, target) in targets.into_iter().enumerate() {
        table.set(id, target);
    }
    Dispatcher::new(table).unwrap()
}

/// Dispatches and returns every response the completion callback saw.
fn dispatch_and_collect(dispatcher: &Dispatcher, id: isize, uri: &str) -> Vec<Response> {
    let (tx, rx) = mpsc::channel();
    let call = CallInfo::new(request(uri), move |resp| {
        let _ = tx.send(resp);
    });
    dispatcher.dispatch(id, call);

    let mut seen = vec![rx.recv_timeout(WAIT).expect("call never completed")];
    // A second completion would arrive right behind the first.
    while let Ok(extra) = rx.recv_timeout(Duration::from_millis(50)) {
        seen.push(extra);
    }
    seen
}

fn single(dispatcher: &Dispatcher, id: isize) -> Response {
    let mut seen = dispatch_and_collect(dispatcher, id, "/");
    assert_eq!(seen.len(), 1, "completion fired {} times", seen.len());
    seen.remove(0)
}

#[test]
fn test_blocking_completes_before_dispatch_returns() {
    let d = dispatcher(vec![DispatchTarget::new(hello(), true).unwrap()]);
    let (tx, rx) = mpsc::channel();
    let call = CallInfo::new(request("/"), move |resp| {
        let _ = tx.send(resp);
    });

    d.dispatch(0, call);

    let resp = rx.try_recv().expect("blocking handler must complete inline");
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.body(), Some(&b"Hello world!"[..]));
}

#[test]
fn test_background_runs_off_the_calling_thread() {
    let caller = thread::current().id();
    let handler = Handler::sync(move |_, resp| {
        let same = thread::current().id() == caller;
        resp.set_body(if same { "same" } else { "other" });
        Ok(())
    });
    let d = dispatcher(vec![DispatchTarget::new(handler, false).unwrap()]);

    let resp = single(&d, 0);

    assert_eq!(resp.body(), Some(&b"other"[..]));
}

#[test]
fn test_blocking_and_background_produce_identical_responses() {
    let d = dispatcher(vec![
        DispatchTarget::new(hello(), true).unwrap(),
        DispatchTarget::new(hello(), false).unwrap(),
    ]);

    assert_eq!(single(&d, 0), single(&d, 1));
}

#[test]
fn test_cooperative_handler_completes() {
    let handler = Handler::suspendable(|req: Arc<Request>, mut resp: Response| async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        resp.set_body(format!("suspended at {}", req.uri));
        Ok::<_, anyhow::Error>(resp)
    });
    let d = dispatcher(vec![DispatchTarget::new(handler, false).unwrap()]);

    let mut seen = dispatch_and_collect(&d, 0, "/wait");

    assert_eq!(seen.len(), 1);
    assert_eq!(seen.remove(0).body(), Some(&b"suspended at /wait"[..]));
}

#[test]
fn test_cooperative_tasks_interleave_on_one_thread() {
    let handler = Handler::suspendable(|_: Arc<Request>, mut resp: Response| async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        resp.set_body(format!("{:?}", thread::current().id()));
        Ok::<_, anyhow::Error>(resp)
    });
    let d = dispatcher(vec![DispatchTarget::new(handler, false).unwrap()]);

    let (tx, rx) = mpsc::channel();
    for _ in 0..5 {
        let tx = tx.clone();
        d.dispatch(
            0,
            CallInfo::new(request("/"), move |resp| {
                let _ = tx.send(resp);
            }),
        );
    }

    // Five 200ms sleeps finishing well under a second means they overlapped.
    let started = std::time::Instant::now();
    let bodies: Vec<_> = (0..5)
        .map(|_| rx.recv_timeout(WAIT).unwrap().body().unwrap().to_vec())
        .collect();
    assert!(started.elapsed() < Duration::from_millis(900));
    assert!(bodies.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn test_blocking_suspendable_is_rejected() {
    let handler = Handler::suspendable(|_: Arc<Request>, resp: Response| async move {
        Ok::<_, anyhow::Error>(resp)
    });

    let err = DispatchTarget::new(handler, true).unwrap_err();

    assert_eq!(err, RegistrationError::BlockingSuspendable);
}

#[test]
fn test_unmatched_and_unknown_ids_get_not_found() {
    let d = dispatcher(vec![DispatchTarget::new(hello(), true).unwrap()]);

    for id in [NO_ROUTE, -7, 1, 99] {
        let resp = single(&d, id);
        assert_eq!(resp.status(), 404);
        assert_eq!(resp.body(), Some(&b"Not found\n"[..]));
    }
}

#[test]
fn test_failing_handler_yields_500_in_every_strategy() {
    let failing = || Handler::sync(|_, _| bail!("disk on fire"));
    let failing_async = Handler::suspendable(|_: Arc<Request>, _: Response| async move {
        Err::<Response, _>(anyhow::anyhow!("disk on fire"))
    });
    let d = dispatcher(vec![
        DispatchTarget::new(failing(), true).unwrap(),
        DispatchTarget::new(failing(), false).unwrap(),
        DispatchTarget::new(failing_async, false).unwrap(),
    ]);

    for id in 0..3 {
        let resp = single(&d, id);
        assert_eq!(resp.status(), 500);
        assert_eq!(resp.body(), Some(&b"Error: disk on fire\n"[..]));
    }
}

#[test]
fn test_failure_discards_partial_response() {
    let handler = Handler::sync(|_, resp| {
        resp.set_body("half written");
        resp.add_header("X-Partial", "yes");
        bail!("gave up")
    });
    let d = dispatcher(vec![DispatchTarget::new(handler, true).unwrap()]);

    let resp = single(&d, 0);

    assert_eq!(resp.status(), 500);
    assert_eq!(resp.header("X-Partial"), None);
}

#[test]
fn test_panicking_handler_is_isolated() {
    let panicking = || Handler::sync(|_, _| panic!("kaboom"));
    let panicking_async =
        Handler::suspendable(|_: Arc<Request>, resp: Response| async move {
            if resp.status() == 200 {
                panic!("kaboom");
            }
            Ok::<_, anyhow::Error>(resp)
        });
    let d = dispatcher(vec![
        DispatchTarget::new(panicking(), true).unwrap(),
        DispatchTarget::new(panicking(), false).unwrap(),
        DispatchTarget::new(panicking_async, false).unwrap(),
        DispatchTarget::new(hello(), false).unwrap(),
    ]);

    for id in 0..3 {
        let resp = single(&d, id);
        assert_eq!(resp.status(), 500);
        let body = String::from_utf8(resp.body().unwrap().to_vec()).unwrap();
        assert!(body.contains("kaboom"), "body was {body:?}");
    }

    // Neither the scheduler nor the dispatcher is poisoned afterwards.
    assert_eq!(single(&d, 3).status(), 200);
    assert_eq!(single(&d, 2).status(), 500);
}

#[test]
fn test_many_concurrent_calls_complete_exactly_once() {
    let d = Arc::new(dispatcher(vec![
        DispatchTarget::new(hello(), true).unwrap(),
        DispatchTarget::new(hello(), false).unwrap(),
        DispatchTarget::new(
            Handler::suspendable(|_: Arc<Request>, resp: Response| async move {
                Ok::<_, anyhow::Error>(resp)
            }),
            false,
        )
        .unwrap(),
    ]));
    let completions = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = mpsc::channel();

    for i in 0..60 {
        let completions = Arc::clone(&completions);
        let tx = tx.clone();
        d.dispatch(
            i % 4 - 1,
            CallInfo::new(request("/"), move |_| {
                completions.fetch_add(1, Ordering::SeqCst);
                let _ = tx.send(());
            }),
        );
    }
    for _ in 0..60 {
        rx.recv_timeout(WAIT).unwrap();
    }
    thread::sleep(Duration::from_millis(50));

    assert_eq!(completions.load(Ordering::SeqCst), 60);
}

#[test]
fn test_dropped_call_completes_with_500() {
    let (tx, rx) = mpsc::channel();
    let call = CallInfo::new(request("/"), move |resp| {
        let _ = tx.send(resp);
    });

    drop(call);

    let resp = rx.try_recv().unwrap();
    assert_eq!(resp.status(), 500);
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_dispatch_table_lookup() {
    let mut table = DispatchTable::new();
    table.set(2, DispatchTarget::new(hello(), true).unwrap());

    assert!(table.get(0).is_none());
    assert!(table.get(-1).is_none());
    assert!(table.get(2).unwrap().is_blocking());
    assert_eq!(table.len(), 1);
}

#[test]
fn test_failure_in_flight_leaves_other_endpoint_untouched() {
    let slow_ok = Handler::sync(|_, resp| {
        thread::sleep(Duration::from_millis(150));
        resp.set_body("still fine");
        Ok(())
    });
    let boom = Handler::suspendable(|_: Arc<Request>, _: Response| async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        Err::<Response, _>(anyhow::anyhow!("boom"))
    });
    let d = dispatcher(vec![
        DispatchTarget::new(slow_ok, false).unwrap(),
        DispatchTarget::new(boom, false).unwrap(),
    ]);

    let (tx, rx) = mpsc::channel();
    for (id, uri) in [(0, "/ok"), (1, "/boom")] {
        let tx = tx.clone();
        d.dispatch(
            id,
            CallInfo::new(request(uri), move |resp| {
                let _ = tx.send((uri, resp));
            }),
        );
    }
    drop(tx);

    let mut seen: Vec<(&str, Response)> = Vec::new();
    while let Ok(entry) = rx.recv_timeout(WAIT) {
        seen.push(entry);
    }

    assert_eq!(seen.len(), 2);
    // The failing call finishes while the slow one is still running.
    assert_eq!(seen[0].0, "/boom");
    assert_eq!(seen[0].1.status(), 500);
    assert_eq!(seen[1].0, "/ok");
    assert_eq!(seen[1].1.status(), 200);
    assert_eq!(seen[1].1.body(), Some(&b"still fine"[..]));
}
