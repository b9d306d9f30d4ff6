//! `driver_contract` 集成测试：验证 Tokio 驱动对录制端与写入端输入的串行化。
//!
//! # 测试目标（Why）
//! - 驱动是宿主最常用的接入方式；句柄语义（非阻塞投递、请求应答、任务结束后的错误）
//!   与写入端通知的优先级必须稳定；
//! - 写入端失败与句柄全部丢弃是两条终止路径，需要分别确认任务的返回值。

#![cfg(feature = "runtime-tokio")]

mod support;

use spark_burst_buffer::{
    BurstBufferDriver, BurstBufferError, FlushOutcome, WriterError,
};
use support::{RecordingLogger, ValveWriter, buffer_with, chunk};

#[tokio::test]
async fn accepted_chunks_reach_the_writer_in_order() {
    let buffer = buffer_with(10_000, 80.0, RecordingLogger::new());
    let (mut driver, handle) = BurstBufferDriver::new(buffer);
    let writer = ValveWriter::unlimited();
    driver.attach(writer.clone()).expect("首次挂载");
    let task = driver.spawn();

    for fill in 1..=3 {
        handle.accept(chunk(fill, 64));
    }
    assert_eq!(handle.flush().await.expect("驱动运行中"), FlushOutcome::Drained);
    let fills: Vec<u8> = writer.written().iter().map(|c| c[0]).collect();
    assert_eq!(fills, vec![1, 2, 3]);

    let metrics = handle.metrics().await.expect("驱动运行中");
    assert_eq!(metrics.bytes_written, 192);

    drop(handle);
    task.await.expect("任务未崩溃").expect("句柄丢弃后正常结束");
}

#[tokio::test]
async fn ready_notification_resumes_draining() {
    let buffer = buffer_with(10_000, 80.0, RecordingLogger::new());
    let (mut driver, handle) = BurstBufferDriver::new(buffer);
    let writer = ValveWriter::with_allowance(1);
    driver.attach(writer.clone()).expect("首次挂载");
    let notifier = driver.notifier();
    let task = driver.spawn();

    handle.accept(chunk(1, 100));
    handle.accept(chunk(2, 100));
    handle.accept(chunk(3, 100));
    let stats = handle.stats().await.expect("驱动运行中");
    assert_eq!(stats.used, 200, "背压期间数据留在缓冲");

    writer.open(usize::MAX);
    notifier.ready();
    assert_eq!(handle.flush().await.expect("驱动运行中"), FlushOutcome::Drained);
    assert_eq!(writer.written_bytes(), 300);

    handle.destroy(None).expect("驱动运行中");
    task.await.expect("任务未崩溃").expect("无终止原因");
}

#[tokio::test]
async fn writer_failure_terminates_driver() {
    let buffer = buffer_with(10_000, 80.0, RecordingLogger::new());
    let (mut driver, handle) = BurstBufferDriver::new(buffer);
    driver
        .attach(ValveWriter::with_allowance(1))
        .expect("首次挂载");
    let notifier = driver.notifier();
    let task = driver.spawn();

    handle.accept(chunk(1, 10));
    notifier.failed(WriterError::Closed);

    let result = task.await.expect("任务未崩溃");
    assert!(matches!(
        result,
        Err(BurstBufferError::Writer(WriterError::Closed))
    ));
    assert!(handle.is_closed());
    assert!(matches!(
        handle.flush().await,
        Err(BurstBufferError::DriverClosed)
    ));
    handle.accept(chunk(2, 10));
}

#[tokio::test]
async fn destroy_cause_becomes_task_result() {
    let buffer = buffer_with(1000, 80.0, RecordingLogger::new());
    let (driver, handle) = BurstBufferDriver::new(buffer);
    let task = driver.spawn();

    handle.accept(chunk(1, 500));
    handle
        .destroy(Some(BurstBufferError::terminated("operator stop")))
        .expect("驱动运行中");

    let result = task.await.expect("任务未崩溃");
    assert!(matches!(result, Err(BurstBufferError::Terminated { .. })));
}

/// 句柄全部丢弃时的最后一次冲刷若浮出暂存的写入端错误，任务以该错误结束而不是正常退出。
#[tokio::test]
async fn final_flush_error_becomes_task_result() {
    let mut buffer = buffer_with(10_000, 80.0, RecordingLogger::new());
    let writer = ValveWriter::unlimited();
    writer.fail_with(WriterError::Closed);
    buffer.attach(writer).expect("空缓冲挂载不会触发写入");
    buffer.accept(chunk(1, 10));

    let (driver, handle) = BurstBufferDriver::new(buffer);
    drop(handle);

    let result = driver.run().await;
    assert!(matches!(
        result,
        Err(BurstBufferError::Writer(WriterError::Closed))
    ));
}

/// 句柄全部丢弃时写入端仍在背压：剩余数据随销毁释放，任务正常结束。
#[tokio::test]
async fn dropping_handles_with_backlog_ends_cleanly() {
    let buffer = buffer_with(10_000, 80.0, RecordingLogger::new());
    let (mut driver, handle) = BurstBufferDriver::new(buffer);
    driver
        .attach(ValveWriter::with_allowance(1))
        .expect("首次挂载");
    let task = driver.spawn();

    handle.accept(chunk(1, 10));
    handle.accept(chunk(2, 10));
    let stats = handle.stats().await.expect("驱动运行中");
    assert_eq!(stats.used, 10);

    drop(handle);
    task.await.expect("任务未崩溃").expect("无终止原因");
}
