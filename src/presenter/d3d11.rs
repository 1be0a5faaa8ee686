use super::{
    expand_rows, letterbox, mapped_len, present_mode, PresentMode, Presenter, PresenterError,
    PresenterState,
};
use crate::control::ControlState;
use crate::frame::Frame;
use crate::log_info;
use windows::{
    core::*,
    Win32::{
        Foundation::*,
        Graphics::{Direct3D::*, Direct3D11::*, Dxgi::Common::*, Dxgi::*},
    },
};

const SHADER_SOURCE: &str = include_str!("shaders.hlsl");
const CLEAR_BLACK: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

// Field order is teardown order: view before texture.
struct UploadTexture {
    srv: ID3D11ShaderResourceView,
    texture: ID3D11Texture2D,
    width: u32,
    height: u32,
}

// Field order is teardown order: views and textures, then pipeline objects,
// then the swapchain and context, device last.
struct GpuResources {
    upload: Option<UploadTexture>,
    rtv: ID3D11RenderTargetView,
    sampler: ID3D11SamplerState,
    pixel_shader: ID3D11PixelShader,
    vertex_shader: ID3D11VertexShader,
    swap_chain: IDXGISwapChain1,
    context: ID3D11DeviceContext,
    device: ID3D11Device,
}

/// Direct3D 11 flip-model presenter for a single window.
pub struct D3D11Presenter {
    state: PresenterState,
    resources: Option<GpuResources>,
    surface_width: u32,
    surface_height: u32,
    tearing_supported: bool,
}

impl D3D11Presenter {
    pub fn new() -> Self {
        Self {
            state: PresenterState::Uninitialized,
            resources: None,
            surface_width: 0,
            surface_height: 0,
            tearing_supported: false,
        }
    }

    /// Creates device, swapchain, shaders and sampler for `hwnd`.
    ///
    /// On failure every object created so far is released before returning.
    pub fn initialize(&mut self, hwnd: HWND, width: u32, height: u32) -> std::result::Result<(), PresenterError> {
        if self.state != PresenterState::Uninitialized {
            return Err(PresenterError::InvalidState(self.state));
        }

        let resources = unsafe { Self::create_resources(hwnd, width, height, &mut self.tearing_supported) }
            .map_err(|e| PresenterError::Init(e.to_string()))?;

        self.resources = Some(resources);
        self.surface_width = width;
        self.surface_height = height;
        self.state = PresenterState::Initialized;

        log_info!(
            "D3D11 presenter initialized ({}x{}, tearing: {})",
            width,
            height,
            self.tearing_supported
        );
        Ok(())
    }

    pub fn state(&self) -> PresenterState {
        self.state
    }

    pub fn tearing_supported(&self) -> bool {
        self.tearing_supported
    }

    /// Releases all GPU objects in dependency order. Only the first call
    /// does anything.
    pub fn release(&mut self) {
        if let Some(resources) = self.resources.take() {
            unsafe {
                resources.context.ClearState();
                resources.context.Flush();
            }
            drop(resources);
            log_info!("D3D11 presenter released");
        }
        if self.state == PresenterState::Initialized {
            self.state = PresenterState::Destroyed;
        }
    }

    fn resources_mut(&mut self) -> std::result::Result<&mut GpuResources, PresenterError> {
        match (self.state, self.resources.as_mut()) {
            (PresenterState::Initialized, Some(resources)) => Ok(resources),
            (state, _) => Err(PresenterError::InvalidState(state)),
        }
    }

    unsafe fn create_resources(
        hwnd: HWND,
        width: u32,
        height: u32,
        tearing_supported: &mut bool,
    ) -> anyhow::Result<GpuResources> {
        let (device, context) = Self::create_d3d_device()?;

        let dxgi_device: IDXGIDevice = device.cast()?;
        let dxgi_adapter = dxgi_device.GetAdapter()?;
        let dxgi_factory: IDXGIFactory2 = dxgi_adapter.GetParent()?;

        *tearing_supported = Self::check_tearing_support(&dxgi_factory);
        let swap_chain = Self::create_swap_chain(&dxgi_factory, &device, hwnd, width, height, *tearing_supported)?;
        dxgi_factory.MakeWindowAssociation(hwnd, DXGI_MWA_NO_ALT_ENTER)?;

        let back_buffer: ID3D11Texture2D = swap_chain.GetBuffer(0)?;
        let mut rtv: Option<ID3D11RenderTargetView> = None;
        device.CreateRenderTargetView(&back_buffer, None, Some(&mut rtv))?;
        let rtv = rtv.ok_or_else(|| anyhow::anyhow!("CreateRenderTargetView returned no view"))?;

        let (vertex_shader, pixel_shader) = Self::create_shaders(&device)?;
        let sampler = Self::create_point_sampler(&device)?;

        Ok(GpuResources {
            upload: None,
            rtv,
            sampler,
            pixel_shader,
            vertex_shader,
            swap_chain,
            context,
            device,
        })
    }

    unsafe fn create_d3d_device() -> anyhow::Result<(ID3D11Device, ID3D11DeviceContext)> {
        let mut device: Option<ID3D11Device> = None;
        let mut context: Option<ID3D11DeviceContext> = None;

        let feature_levels = [D3D_FEATURE_LEVEL_11_1, D3D_FEATURE_LEVEL_11_0];

        D3D11CreateDevice(
            None,
            D3D_DRIVER_TYPE_HARDWARE,
            HMODULE::default(),
            D3D11_CREATE_DEVICE_BGRA_SUPPORT,
            Some(&feature_levels),
            D3D11_SDK_VERSION,
            Some(&mut device),
            None,
            Some(&mut context),
        )?;

        match (device, context) {
            (Some(device), Some(context)) => Ok((device, context)),
            _ => anyhow::bail!("D3D11CreateDevice returned no device"),
        }
    }

    unsafe fn check_tearing_support(factory: &IDXGIFactory2) -> bool {
        let Ok(factory5) = factory.cast::<IDXGIFactory5>() else {
            return false;
        };

        let mut allow = BOOL(0);
        factory5
            .CheckFeatureSupport(
                DXGI_FEATURE_PRESENT_ALLOW_TEARING,
                &mut allow as *mut BOOL as *mut _,
                std::mem::size_of::<BOOL>() as u32,
            )
            .is_ok()
            && allow.as_bool()
    }

    unsafe fn create_swap_chain(
        factory: &IDXGIFactory2,
        device: &ID3D11Device,
        hwnd: HWND,
        width: u32,
        height: u32,
        tearing_supported: bool,
    ) -> anyhow::Result<IDXGISwapChain1> {
        let flags = if tearing_supported {
            DXGI_SWAP_CHAIN_FLAG_ALLOW_TEARING.0 as u32
        } else {
            0
        };

        let swap_chain_desc = DXGI_SWAP_CHAIN_DESC1 {
            Width: width,
            Height: height,
            Format: DXGI_FORMAT_R8G8B8A8_UNORM,
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
            BufferCount: 2,
            SwapEffect: DXGI_SWAP_EFFECT_FLIP_DISCARD,
            Flags: flags,
            ..Default::default()
        };

        let swap_chain = factory.CreateSwapChainForHwnd(device, hwnd, &swap_chain_desc, None, None)?;
        Ok(swap_chain)
    }

    unsafe fn create_shaders(device: &ID3D11Device) -> anyhow::Result<(ID3D11VertexShader, ID3D11PixelShader)> {
        let vs_blob = Self::compile_shader(SHADER_SOURCE, "VS_Main", "vs_5_0")?;
        let mut vertex_shader: Option<ID3D11VertexShader> = None;
        device.CreateVertexShader(blob_bytes(&vs_blob), None, Some(&mut vertex_shader))?;

        let ps_blob = Self::compile_shader(SHADER_SOURCE, "PS_Main", "ps_5_0")?;
        let mut pixel_shader: Option<ID3D11PixelShader> = None;
        device.CreatePixelShader(blob_bytes(&ps_blob), None, Some(&mut pixel_shader))?;

        match (vertex_shader, pixel_shader) {
            (Some(vs), Some(ps)) => Ok((vs, ps)),
            _ => anyhow::bail!("Shader creation returned no object"),
        }
    }

    unsafe fn compile_shader(source: &str, entry_point: &str, target: &str) -> anyhow::Result<ID3DBlob> {
        use windows::Win32::Graphics::Direct3D::Fxc::*;

        let mut blob: Option<ID3DBlob> = None;
        let mut error_blob: Option<ID3DBlob> = None;

        let entry_cstr = std::ffi::CString::new(entry_point)?;
        let target_cstr = std::ffi::CString::new(target)?;

        let result = D3DCompile(
            source.as_ptr() as *const _,
            source.len(),
            None,
            None,
            None,
            PCSTR(entry_cstr.as_ptr() as *const u8),
            PCSTR(target_cstr.as_ptr() as *const u8),
            D3DCOMPILE_ENABLE_STRICTNESS,
            0,
            &mut blob,
            Some(&mut error_blob),
        );

        if result.is_err() {
            if let Some(error_blob) = error_blob {
                let error_str = String::from_utf8_lossy(blob_bytes(&error_blob));
                anyhow::bail!("Shader compilation failed ({}): {}", entry_point, error_str);
            }
            anyhow::bail!("Shader compilation failed ({})", entry_point);
        }

        blob.ok_or_else(|| anyhow::anyhow!("Shader compilation produced no bytecode ({})", entry_point))
    }

    unsafe fn create_point_sampler(device: &ID3D11Device) -> anyhow::Result<ID3D11SamplerState> {
        let sampler_desc = D3D11_SAMPLER_DESC {
            Filter: D3D11_FILTER_MIN_MAG_MIP_POINT,
            AddressU: D3D11_TEXTURE_ADDRESS_CLAMP,
            AddressV: D3D11_TEXTURE_ADDRESS_CLAMP,
            AddressW: D3D11_TEXTURE_ADDRESS_CLAMP,
            MipLODBias: 0.0,
            MaxAnisotropy: 1,
            ComparisonFunc: D3D11_COMPARISON_NEVER,
            BorderColor: [0.0, 0.0, 0.0, 0.0],
            MinLOD: 0.0,
            MaxLOD: f32::MAX,
        };

        let mut sampler: Option<ID3D11SamplerState> = None;
        device.CreateSamplerState(&sampler_desc, Some(&mut sampler))?;
        sampler.ok_or_else(|| anyhow::anyhow!("CreateSamplerState returned no sampler"))
    }

    unsafe fn create_upload_texture(device: &ID3D11Device, width: u32, height: u32) -> anyhow::Result<UploadTexture> {
        let texture_desc = D3D11_TEXTURE2D_DESC {
            Width: width,
            Height: height,
            MipLevels: 1,
            ArraySize: 1,
            Format: DXGI_FORMAT_R8G8B8A8_UNORM,
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            Usage: D3D11_USAGE_DYNAMIC,
            BindFlags: D3D11_BIND_SHADER_RESOURCE.0 as u32,
            CPUAccessFlags: D3D11_CPU_ACCESS_WRITE.0 as u32,
            MiscFlags: 0,
        };

        let mut texture: Option<ID3D11Texture2D> = None;
        device.CreateTexture2D(&texture_desc, None, Some(&mut texture))?;
        let texture = texture.ok_or_else(|| anyhow::anyhow!("CreateTexture2D returned no texture"))?;

        let mut srv: Option<ID3D11ShaderResourceView> = None;
        device.CreateShaderResourceView(&texture, None, Some(&mut srv))?;
        let srv = srv.ok_or_else(|| anyhow::anyhow!("CreateShaderResourceView returned no view"))?;

        Ok(UploadTexture { srv, texture, width, height })
    }
}

impl Default for D3D11Presenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Presenter for D3D11Presenter {
    fn ensure_upload_texture(&mut self, width: u32, height: u32) -> std::result::Result<(), PresenterError> {
        let resources = self.resources_mut()?;
        if let Some(upload) = &resources.upload {
            if upload.width == width && upload.height == height {
                return Ok(());
            }
        }

        resources.upload = None;
        let upload = unsafe { Self::create_upload_texture(&resources.device, width, height) }
            .map_err(|e| PresenterError::TextureCreate {
                width,
                height,
                reason: e.to_string(),
            })?;
        resources.upload = Some(upload);

        log_info!("Upload texture (re)created at {}x{}", width, height);
        Ok(())
    }

    fn upload_frame(&mut self, frame: &Frame) -> std::result::Result<(), PresenterError> {
        let resources = self.resources_mut()?;
        let Some(upload) = &resources.upload else {
            return Err(PresenterError::UploadMap("no upload texture".to_string()));
        };
        if upload.width != frame.width() || upload.height != frame.height() {
            return Err(PresenterError::UploadMap(format!(
                "frame is {}x{}, texture is {}x{}",
                frame.width(),
                frame.height(),
                upload.width,
                upload.height
            )));
        }

        unsafe {
            let mut mapped = D3D11_MAPPED_SUBRESOURCE::default();
            resources
                .context
                .Map(&upload.texture, 0, D3D11_MAP_WRITE_DISCARD, 0, Some(&mut mapped))
                .map_err(|e| PresenterError::UploadMap(e.to_string()))?;

            let row_pitch = mapped.RowPitch as usize;
            let len = mapped_len(frame.width(), frame.height(), row_pitch);
            let dst = std::slice::from_raw_parts_mut(mapped.pData as *mut u8, len);
            expand_rows(frame, dst, row_pitch);

            resources.context.Unmap(&upload.texture, 0);
        }
        Ok(())
    }

    fn render(&mut self, control: &ControlState) -> std::result::Result<(), PresenterError> {
        let (surface_width, surface_height) = (self.surface_width, self.surface_height);
        let mode = present_mode(control.vsync_enabled, self.tearing_supported);
        let resources = self.resources_mut()?;
        let context = &resources.context;

        unsafe {
            context.OMSetRenderTargets(Some(&[Some(resources.rtv.clone())]), None);
            context.ClearRenderTargetView(&resources.rtv, &CLEAR_BLACK);

            if let Some(upload) = &resources.upload {
                let vp = letterbox(upload.width, upload.height, surface_width, surface_height);
                let viewport = D3D11_VIEWPORT {
                    TopLeftX: vp.x,
                    TopLeftY: vp.y,
                    Width: vp.width,
                    Height: vp.height,
                    MinDepth: 0.0,
                    MaxDepth: 1.0,
                };
                context.RSSetViewports(Some(&[viewport]));

                context.IASetPrimitiveTopology(D3D_PRIMITIVE_TOPOLOGY_TRIANGLELIST);
                context.VSSetShader(&resources.vertex_shader, None);
                context.PSSetShader(&resources.pixel_shader, None);
                context.PSSetShaderResources(0, Some(&[Some(upload.srv.clone())]));
                context.PSSetSamplers(0, Some(&[Some(resources.sampler.clone())]));
                context.Draw(3, 0);
            }

            let (sync_interval, flags) = match mode {
                PresentMode::VSync => (1, DXGI_PRESENT(0)),
                PresentMode::Tearing => (0, DXGI_PRESENT_ALLOW_TEARING),
                PresentMode::Immediate => (0, DXGI_PRESENT(0)),
            };
            resources
                .swap_chain
                .Present(sync_interval, flags)
                .ok()
                .map_err(|e| PresenterError::Present(e.to_string()))?;
        }
        Ok(())
    }
}

impl Drop for D3D11Presenter {
    fn drop(&mut self) {
        self.release();
    }
}

unsafe fn blob_bytes(blob: &ID3DBlob) -> &[u8] {
    std::slice::from_raw_parts(blob.GetBufferPointer() as *const u8, blob.GetBufferSize())
}
