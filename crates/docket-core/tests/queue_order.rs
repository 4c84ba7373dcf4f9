use docket_core::{EngineError, ErrorKind, OperationQueue};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn log() -> Arc<Mutex<Vec<u64>>> {
    Arc::new(Mutex::new(Vec::new()))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn slower_early_operations_still_finish_first() {
    let queue = OperationQueue::new();
    let order = log();

    let futures: Vec<_> = (1..=5_u64)
        .map(|i| {
            let order = Arc::clone(&order);
            queue.enqueue(move || async move {
                tokio::time::sleep(Duration::from_millis((6 - i) * 20)).await;
                order.lock().unwrap().push(i);
                Ok::<_, EngineError>(i)
            })
        })
        .collect();

    // Await in reverse to show completion order does not follow await order.
    let mut results = Vec::new();
    for future in futures.into_iter().rev() {
        results.push(future.await.unwrap());
    }

    assert_eq!(*order.lock().unwrap(), vec![1, 2, 3, 4, 5]);
    assert_eq!(results, vec![5, 4, 3, 2, 1]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn callers_on_many_tasks_are_serialized_in_call_order() {
    let queue = OperationQueue::new();
    let order = log();

    let mut handles = Vec::new();
    for i in 1..=5_u64 {
        let order = Arc::clone(&order);
        // enqueue runs here, synchronously, so call order is fixed before spawning.
        let future = queue.enqueue(move || async move {
            order.lock().unwrap().push(i);
            Ok::<_, EngineError>(())
        });
        handles.push(tokio::spawn(future));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(*order.lock().unwrap(), vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn failures_do_not_block_later_operations() {
    let queue = OperationQueue::new();
    let order = log();

    let push = |i: u64| {
        let order = Arc::clone(&order);
        move || async move {
            order.lock().unwrap().push(i);
            Ok::<_, EngineError>(i)
        }
    };

    let first = queue.enqueue(push(1));
    let failing = queue.enqueue(|| async {
        Err::<u64, _>(EngineError::Validation("rejected".into()))
    });
    let panicking = queue.enqueue(|| async {
        if true {
            panic!("operation blew up");
        }
        Ok::<u64, EngineError>(0)
    });
    let last = queue.enqueue(push(4));

    assert_eq!(first.await.unwrap(), 1);
    assert_eq!(failing.await.unwrap_err().kind(), ErrorKind::Validation);
    assert!(matches!(panicking.await, Err(EngineError::Aborted)));
    assert_eq!(last.await.unwrap(), 4);
    assert_eq!(*order.lock().unwrap(), vec![1, 4]);
}

#[tokio::test]
async fn caller_error_types_only_need_from_engine_error() {
    #[derive(Debug)]
    enum AppError {
        Engine(EngineError),
        Busy,
    }

    impl From<EngineError> for AppError {
        fn from(err: EngineError) -> Self {
            Self::Engine(err)
        }
    }

    let queue = OperationQueue::new();
    let busy = queue.enqueue(|| async { Err::<(), _>(AppError::Busy) });
    let aborted = queue.enqueue(|| async {
        if true {
            panic!("boom");
        }
        Ok::<(), AppError>(())
    });
    assert!(matches!(busy.await, Err(AppError::Busy)));
    assert!(matches!(aborted.await, Err(AppError::Engine(EngineError::Aborted))));
}
