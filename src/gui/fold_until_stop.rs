use std::{
    io::{self, stdout},
    ops::ControlFlow,
    sync::{mpsc, Arc, Mutex},
    thread::{spawn, JoinHandle},
    time::Duration,
};

use crate::gui::error::GuiError;

use crossterm::{
    event::{self, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};

use ratatui::{
    prelude::*,
    widgets::{block::Title, *},
    Terminal,
};

enum ThreadMessage {
    Stop,
}

/// A monitor failure, together with the fold state if it survived.
///
/// `state` is only `None` when the fold itself panicked.
#[derive(Debug)]
pub struct FoldError<T> {
    /// What went wrong with the screen or the worker
    pub error: GuiError,
    /// The latest state of the fold
    pub state: Option<T>,
}

/// Generates a gui that runs a function until the user provides input.
///
/// The function can be thought of as a recursive fold. `init` contains the
/// inital state of the loop, then `f` is called on the inital state to produce
/// a new state, and then `f` is called on that new state, and so on until the
/// user presses a key or `f` breaks. The screen shows `describe` of the latest
/// state. In raw mode Ctrl-C arrives as a key press, so it stops the fold too.
///
/// If the terminal fails, the fold is still stopped and its state is handed
/// back in the [FoldError].
pub fn fold_until_stop<F, D, T>(title: &str, init: T, f: F, describe: D) -> Result<T, FoldError<T>>
where
    F: FnMut(T) -> ControlFlow<T, T> + Send + 'static,
    D: Fn(&T) -> String + Send + 'static,
    T: Send + 'static,
{
    if let Err(e) = enter_screen() {
        // Leave the terminal usable for whatever runs next
        let _ = leave_screen();
        return Err(FoldError {
            error: e.into(),
            state: Some(init),
        });
    }

    let folded = fold_while(init, f, describe, |status, worker| {
        draw_until_key(title, status, worker)
    });
    let restored = leave_screen();

    match (folded, restored) {
        (Ok(val), Ok(())) => Ok(val),
        (Ok(val), Err(e)) => Err(FoldError {
            error: e.into(),
            state: Some(val),
        }),
        (Err(e), _) => Err(e),
    }
}

fn enter_screen() -> io::Result<()> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    Ok(())
}

fn leave_screen() -> io::Result<()> {
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    Ok(())
}

// Runs the fold on a worker thread while `screen` runs on this one. The
// worker is told to stop as soon as `screen` returns, for any reason.
fn fold_while<F, D, T, S>(init: T, mut f: F, describe: D, screen: S) -> Result<T, FoldError<T>>
where
    F: FnMut(T) -> ControlFlow<T, T> + Send + 'static,
    D: Fn(&T) -> String + Send + 'static,
    T: Send + 'static,
    S: FnOnce(&Mutex<String>, &JoinHandle<()>) -> Result<(), GuiError>,
{
    let (stop_tx, stop_rx) = mpsc::channel();
    let (res_tx, res_rx) = mpsc::channel();
    let status = Arc::new(Mutex::new(describe(&init)));
    let th_status = Arc::clone(&status);

    let th = spawn(move || {
        let mut val = init;

        loop {
            let (next, done) = match f(val) {
                ControlFlow::Continue(v) => (v, false),
                ControlFlow::Break(v) => (v, true),
            };
            val = next;
            if let Ok(mut line) = th_status.lock() {
                *line = describe(&val);
            }
            if done || matches!(stop_rx.try_recv(), Ok(ThreadMessage::Stop)) {
                // The receiving end outlives the worker
                let _ = res_tx.send(val);
                break;
            }
        }
    });

    let shown = screen(&*status, &th);

    let _ = stop_tx.send(ThreadMessage::Stop);
    let res = res_rx.recv();
    let joined = th.join();

    let error = match (shown, joined) {
        (Err(e), _) => Some(e),
        (Ok(()), Err(_)) => Some(GuiError::JoinError),
        (Ok(()), Ok(())) => None,
    };
    match (res, error) {
        (Ok(val), None) => Ok(val),
        (res, Some(error)) => Err(FoldError {
            error,
            state: res.ok(),
        }),
        (Err(e), None) => Err(FoldError {
            error: e.into(),
            state: None,
        }),
    }
}

fn draw_until_key(
    title: &str,
    status: &Mutex<String>,
    worker: &JoinHandle<()>,
) -> Result<(), GuiError> {
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    terminal.clear()?;

    while !worker.is_finished() {
        let line = status
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|_| String::from("status unavailable"));
        let title = Title::from(format!(" {} ", title).magenta().bold());
        let text = Paragraph::new(vec![
            Line::from(format!(" {} ", line)),
            Line::from(" Press any key to stop ".dark_gray()),
        ]);
        let block = Block::default()
            .title(title.alignment(Alignment::Center))
            .borders(Borders::ALL);
        terminal.draw(|frame| {
            let area = frame.size();
            frame.render_widget(text.block(block), area);
        })?;
        if event::poll(Duration::from_millis(16))? {
            if let event::Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    break;
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn wait_for(worker: &JoinHandle<()>) {
        while !worker.is_finished() {
            sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn fold_runs_until_it_breaks() {
        let res = fold_while(
            0u32,
            |n| if n < 5 { ControlFlow::Continue(n + 1) } else { ControlFlow::Break(n) },
            |n| n.to_string(),
            |_, worker| {
                wait_for(worker);
                Ok(())
            },
        );
        assert_eq!(res.unwrap(), 5);
    }

    #[test]
    fn status_follows_the_latest_state() {
        let res = fold_while(
            0u32,
            |n| if n < 3 { ControlFlow::Continue(n + 1) } else { ControlFlow::Break(n) },
            |n| format!("n = {}", n),
            |status, worker| {
                wait_for(worker);
                assert_eq!(*status.lock().unwrap(), "n = 3");
                Ok(())
            },
        );
        assert!(res.is_ok());
    }

    #[test]
    fn screen_failure_keeps_the_state() {
        let res = fold_while(
            vec![1u8],
            |mut v: Vec<u8>| {
                v.push(0);
                sleep(Duration::from_millis(1));
                ControlFlow::Continue(v)
            },
            |v| v.len().to_string(),
            |_, _| Err(io::Error::new(io::ErrorKind::Other, "terminal went away").into()),
        );

        let FoldError { error, state } = res.unwrap_err();
        assert!(matches!(error, GuiError::IOError(_)));
        assert_eq!(state.unwrap()[0], 1);
    }

    #[test]
    fn panicking_fold_has_no_state() {
        let res = fold_while(
            0u32,
            |_| -> ControlFlow<u32, u32> { panic!("fold blew up") },
            |n| n.to_string(),
            |_, worker| {
                wait_for(worker);
                Ok(())
            },
        );

        let FoldError { error, state } = res.unwrap_err();
        assert!(matches!(error, GuiError::JoinError));
        assert!(state.is_none());
    }
}
