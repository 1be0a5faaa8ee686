use crate::control::{EventPump, Trigger, TriggerInput};
use crate::state::KeyBindings;
use crate::{log_info, log_warn};
use anyhow::Result;
use windows::{
    core::*,
    Win32::{
        Foundation::*,
        System::{LibraryLoader::GetModuleHandleW, Threading::*},
        UI::{Input::KeyboardAndMouse::*, WindowsAndMessaging::*},
    },
};

/// Borderless top-most window covering the primary display.
///
/// The cursor is hidden for the window's lifetime.
pub struct FullscreenWindow {
    hwnd: HWND,
    width: u32,
    height: u32,
}

impl FullscreenWindow {
    pub fn create() -> Result<Self> {
        unsafe {
            let width = GetSystemMetrics(SM_CXSCREEN);
            let height = GetSystemMetrics(SM_CYSCREEN);

            let class_name = w!("DisplayBridgeWindow");
            let hinstance = GetModuleHandleW(None)?;

            let wc = WNDCLASSEXW {
                cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
                lpfnWndProc: Some(Self::window_proc),
                hInstance: hinstance.into(),
                lpszClassName: class_name,
                ..Default::default()
            };
            RegisterClassExW(&wc);

            let hwnd = CreateWindowExW(
                WS_EX_TOPMOST,
                class_name,
                w!("Display Bridge"),
                WS_POPUP | WS_VISIBLE,
                0, 0, width, height,
                None, None,
                Some(HINSTANCE(hinstance.0)),
                None,
            )?;

            let _ = SetForegroundWindow(hwnd);
            let _ = SetFocus(Some(hwnd));
            while ShowCursor(false) >= 0 {}

            log_info!("Fullscreen window created ({}x{})", width, height);

            Ok(Self {
                hwnd,
                width: width as u32,
                height: height as u32,
            })
        }
    }

    pub fn hwnd(&self) -> HWND {
        self.hwnd
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    unsafe extern "system" fn window_proc(
        hwnd: HWND,
        msg: u32,
        wparam: WPARAM,
        lparam: LPARAM,
    ) -> LRESULT {
        match msg {
            // Surfaces as WM_QUIT in the pump; the control loop decides when to stop.
            WM_CLOSE => {
                PostQuitMessage(0);
                LRESULT(0)
            }
            _ => DefWindowProcW(hwnd, msg, wparam, lparam),
        }
    }
}

impl Drop for FullscreenWindow {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = DestroyWindow(self.hwnd) {
                log_warn!("Failed to destroy window: {:?}", e);
            }
            while ShowCursor(true) < 0 {}
        }
    }
}

/// Drains the calling thread's message queue.
#[derive(Default)]
pub struct Win32EventPump;

impl EventPump for Win32EventPump {
    fn pump(&mut self) -> bool {
        let mut close_requested = false;
        unsafe {
            let mut msg = MSG::default();
            while PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE).as_bool() {
                if msg.message == WM_QUIT {
                    close_requested = true;
                }
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
        close_requested
    }
}

/// Level-state polling of the bound virtual keys. Works for mouse side
/// buttons as well as keyboard keys.
pub struct AsyncKeyInput {
    bindings: KeyBindings,
}

impl AsyncKeyInput {
    pub fn new(bindings: KeyBindings) -> Self {
        Self { bindings }
    }
}

impl TriggerInput for AsyncKeyInput {
    fn is_active(&mut self, trigger: Trigger) -> bool {
        let vk = self.bindings.key_for(trigger);
        unsafe { (GetAsyncKeyState(vk as i32) as u16 & 0x8000) != 0 }
    }
}

pub(super) fn raise_current_thread_priority() {
    unsafe {
        if let Err(e) = SetThreadPriority(GetCurrentThread(), THREAD_PRIORITY_TIME_CRITICAL) {
            log_warn!("Failed to raise capture thread priority: {:?}", e);
        }
    }
}
