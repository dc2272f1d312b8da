mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use blerequest::{
    Data, ErrorKind, Outcome, Request, Response, Status, Value, ValueCallback, WaiterGuard,
};

use common::{Script, ScriptedDispatcher, battery_level, init_tracing};

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

#[test]
fn wait_returns_value_delivered_later() {
    init_tracing();
    let dispatcher = ScriptedDispatcher::new([Script::data(50, &[0x64])]);
    let request = Request::read(battery_level()).attach(dispatcher.clone());

    let start = Instant::now();
    let data: Data = request.wait_timeout(Duration::from_millis(1000)).unwrap();
    assert!(start.elapsed() >= Duration::from_millis(50));
    assert_eq!(data.value(), Some(&[0x64u8][..]));
    assert_eq!(request.outcome(), Outcome::Success);
    assert_eq!(dispatcher.submissions(), 1);
}

#[test]
fn disconnection_is_not_a_generic_failure() {
    let dispatcher = ScriptedDispatcher::new([Script::fail(Status::DEVICE_DISCONNECTED)]);
    let request = Request::read(battery_level()).attach(dispatcher);

    let error = request.wait::<Data>().unwrap_err();
    assert_eq!(error.kind(), ErrorKind::DeviceDisconnected);
    assert_eq!(request.outcome(), Outcome::Failed(Status::DEVICE_DISCONNECTED));
}

#[test]
fn disabled_adapter_is_reported_as_transport_disabled() {
    let dispatcher = ScriptedDispatcher::new([Script::fail(Status::BLUETOOTH_DISABLED)]);
    let request = Request::read(battery_level()).attach(dispatcher);

    let error = request.wait::<Data>().unwrap_err();
    assert_eq!(error.kind(), ErrorKind::TransportDisabled);
}

#[test]
fn other_failures_keep_their_status() {
    let dispatcher = ScriptedDispatcher::new([Script::fail(Status::GATT_INSUFFICIENT_ENCRYPTION)]);
    let request = Request::read(battery_level()).attach(dispatcher);

    let error = request.wait::<Data>().unwrap_err();
    assert_eq!(
        error.kind(),
        ErrorKind::OperationFailed(Status::GATT_INSUFFICIENT_ENCRYPTION)
    );
    assert_eq!(error.status(), Some(Status(15)));
}

#[test]
fn invalid_request_is_reported() {
    let dispatcher = ScriptedDispatcher::new([Script::Invalid]);
    let request = Request::read(battery_level()).attach(dispatcher);

    let error = request.wait::<Data>().unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InvalidRequest);
    assert_eq!(request.outcome(), Outcome::Invalid);
}

#[test]
fn timeout_elapses_within_bounds() {
    let dispatcher = ScriptedDispatcher::new([Script::Hold]);
    let request = Request::read(battery_level()).attach(dispatcher.clone());

    let start = Instant::now();
    let error = request
        .wait_timeout::<Data>(Duration::from_millis(100))
        .unwrap_err();
    let elapsed = start.elapsed();

    assert_eq!(error.kind(), ErrorKind::Timeout);
    assert_eq!(error.status(), None);
    assert!(elapsed >= Duration::from_millis(100), "returned early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(600), "returned late: {elapsed:?}");
    assert_eq!(request.outcome(), Outcome::Pending);
    assert_eq!(dispatcher.held(), 1);
}

#[test]
fn waiting_on_the_dispatch_thread_is_rejected_up_front() {
    let dispatcher = ScriptedDispatcher::confined();
    let request = Request::read(battery_level()).attach(dispatcher.clone());
    let built = counter();

    let start = Instant::now();
    let error = request
        .wait_with({
            let built = built.clone();
            move || {
                built.fetch_add(1, Ordering::SeqCst);
                Data::default()
            }
        })
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::InvalidUsage);
    assert!(start.elapsed() < Duration::from_millis(100));
    assert_eq!(built.load(Ordering::SeqCst), 0);
    assert_eq!(dispatcher.submissions(), 0);
}

#[test]
fn waiting_requires_a_dispatcher() {
    let error = Request::read(battery_level()).wait::<Data>().unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InvalidUsage);
}

#[test]
fn panicking_factory_fails_instantiation_without_submitting() {
    let dispatcher = ScriptedDispatcher::new([]);
    let request = Request::read(battery_level()).attach(dispatcher.clone());

    let error = request
        .wait_with(|| -> Data { panic!("no default container") })
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InstantiationFailed);
    assert_eq!(dispatcher.submissions(), 0);

    dispatcher.push(Script::data(0, &[1]));
    let data: Data = request.wait().unwrap();
    assert_eq!(data.u8_at(0), Some(1));
}

#[test]
fn wait_leaves_caller_callbacks_in_place() {
    let dispatcher = ScriptedDispatcher::new([
        Script::data(0, &[0x10]),
        Script::fail(Status::GATT_ERROR),
        Script::data(0, &[0x20]),
    ]);
    let done = counter();
    let failed = counter();
    let values = Arc::new(Mutex::new(Vec::new()));
    let request = {
        let done = done.clone();
        let failed = failed.clone();
        let values = values.clone();
        Request::read(battery_level())
            .done(move || {
                done.fetch_add(1, Ordering::SeqCst);
            })
            .fail(move |_| {
                failed.fetch_add(1, Ordering::SeqCst);
            })
            .with(move |data: &Data| values.lock().unwrap().push(data.clone()))
            .attach(dispatcher.clone())
    };

    let data: Data = request.wait().unwrap();
    assert_eq!(data.u8_at(0), Some(0x10));
    assert_eq!(request.wait::<Data>().unwrap_err().kind(), ErrorKind::OperationFailed(Status::GATT_ERROR));
    assert_eq!(done.load(Ordering::SeqCst), 0);
    assert_eq!(failed.load(Ordering::SeqCst), 0);
    assert!(values.lock().unwrap().is_empty());

    request.enqueue().unwrap();
    let deadline = Instant::now() + Duration::from_secs(2);
    while done.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(done.load(Ordering::SeqCst), 1);
    assert_eq!(failed.load(Ordering::SeqCst), 0);
    assert_eq!(*values.lock().unwrap(), vec![Data::new(vec![0x20])]);
}

#[test]
fn late_completion_after_timeout_goes_to_callbacks() {
    let dispatcher = ScriptedDispatcher::new([Script::Hold]);
    let done = counter();
    let values = Arc::new(Mutex::new(Vec::new()));
    let request = {
        let done = done.clone();
        let values = values.clone();
        Request::read(battery_level())
            .done(move || {
                done.fetch_add(1, Ordering::SeqCst);
            })
            .with(move |data: &Data| values.lock().unwrap().push(data.clone()))
            .attach(dispatcher.clone())
    };

    let error = request
        .wait_timeout::<Data>(Duration::from_millis(20))
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Timeout);

    dispatcher.release_held(Some(Value::Data(Data::new(vec![0x55]))));
    assert_eq!(done.load(Ordering::SeqCst), 1);
    assert_eq!(*values.lock().unwrap(), vec![Data::new(vec![0x55])]);
    assert_eq!(request.outcome(), Outcome::Success);
}

#[test]
fn reused_request_is_not_contaminated_by_an_earlier_timeout() {
    let dispatcher = ScriptedDispatcher::new([Script::Hold, Script::data(10, &[0x02])]);
    let late = Arc::new(Mutex::new(Vec::new()));
    let request = {
        let late = late.clone();
        Request::read(battery_level())
            .with(move |data: &Data| late.lock().unwrap().push(data.clone()))
            .attach(dispatcher.clone())
    };

    let first = request.wait_timeout::<Data>(Duration::from_millis(30));
    assert_eq!(first.unwrap_err().kind(), ErrorKind::Timeout);

    let second: Data = request.wait_timeout(Duration::from_millis(1000)).unwrap();
    assert_eq!(second.value(), Some(&[0x02u8][..]));

    dispatcher.release_held(Some(Value::Data(Data::new(vec![0x01]))));
    assert_eq!(*late.lock().unwrap(), vec![Data::new(vec![0x01])]);
    assert_eq!(second.value(), Some(&[0x02u8][..]));
}

#[test]
fn concurrent_waits_on_one_request_are_rejected() {
    let dispatcher = ScriptedDispatcher::new([Script::Hold]);
    let request = Request::read(battery_level()).attach(dispatcher.clone());

    let waiting = {
        let request = request.clone();
        thread::spawn(move || request.wait_timeout::<Data>(Duration::from_millis(2000)))
    };
    let deadline = Instant::now() + Duration::from_secs(2);
    while dispatcher.held() == 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }

    let error = request.wait_timeout::<Data>(Duration::from_millis(10)).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InvalidUsage);

    dispatcher.release_held(Some(Value::Data(Data::new(vec![9]))));
    let data = waiting.join().unwrap().unwrap();
    assert_eq!(data.u8_at(0), Some(9));
}

#[test]
fn generic_response_container() {
    let dispatcher = ScriptedDispatcher::new([Script::Succeed {
        after: Duration::ZERO,
        value: Some(Value::Mtu(185)),
    }]);
    let request = Request::request_mtu(517).attach(dispatcher);

    let mtu: Response<u16> = request.wait().unwrap();
    assert_eq!(mtu.value(), Some(&185));
}

#[test]
fn dropped_execution_fails_exactly_once() {
    let dispatcher = ScriptedDispatcher::new([Script::Drop]);
    let done = counter();
    let failed = Arc::new(Mutex::new(Vec::new()));
    let request = {
        let done = done.clone();
        let failed = failed.clone();
        Request::connect()
            .done(move || {
                done.fetch_add(1, Ordering::SeqCst);
            })
            .fail(move |status| failed.lock().unwrap().push(status))
            .attach(dispatcher)
    };

    request.enqueue().unwrap();
    assert_eq!(done.load(Ordering::SeqCst), 0);
    assert_eq!(*failed.lock().unwrap(), vec![Status::CANCELLED]);
    assert_eq!(request.outcome(), Outcome::Failed(Status::CANCELLED));
}

#[test]
fn hooks_bracket_the_outcome() {
    let dispatcher = ScriptedDispatcher::new([Script::Hold]);
    let events = Arc::new(Mutex::new(Vec::new()));
    let record = |event: &'static str| {
        let events = events.clone();
        move || events.lock().unwrap().push(event)
    };
    let request = Request::disconnect()
        .before(record("before"))
        .done(record("done"))
        .invalid(record("invalid"))
        .then(record("after"))
        .attach(dispatcher.clone());

    request.enqueue().unwrap();
    assert_eq!(*events.lock().unwrap(), vec!["before"]);
    dispatcher.release_held(None);
    assert_eq!(*events.lock().unwrap(), vec!["before", "done", "after"]);
}

/// A container that gives up on its own wait as soon as it sees a value.
struct Abandoning {
    guard: Arc<Mutex<Option<WaiterGuard>>>,
    abandoned: Arc<AtomicUsize>,
}

impl ValueCallback<Data> for Abandoning {
    fn on_value(&mut self, _value: &Data) {
        if let Some(guard) = self.guard.lock().unwrap().as_ref() {
            if guard.abandon() {
                self.abandoned.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
}

#[test]
fn container_may_abandon_its_wait_while_receiving_a_value() {
    let dispatcher = ScriptedDispatcher::new([Script::Hold]);
    let done = counter();
    let completed = counter();
    let abandoned = counter();
    let request = {
        let done = done.clone();
        Request::read(battery_level())
            .done(move || {
                done.fetch_add(1, Ordering::SeqCst);
            })
            .attach(dispatcher.clone())
    };

    let slot = Arc::new(Mutex::new(None));
    let guard = request
        .submit_with(
            Abandoning {
                guard: slot.clone(),
                abandoned: abandoned.clone(),
            },
            {
                let completed = completed.clone();
                move |_| {
                    completed.fetch_add(1, Ordering::SeqCst);
                }
            },
        )
        .unwrap();
    *slot.lock().unwrap() = Some(guard);

    dispatcher.release_held(Some(Value::Data(Data::new(vec![3]))));

    assert_eq!(abandoned.load(Ordering::SeqCst), 1);
    assert_eq!(completed.load(Ordering::SeqCst), 0);
    assert_eq!(done.load(Ordering::SeqCst), 1);
    assert_eq!(request.outcome(), Outcome::Success);
}
