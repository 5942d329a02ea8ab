#[cfg(feature = "integration-tests")]
fn headless_device() -> (wgpu::Device, wgpu::Queue) {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
    let adapter = futures::executor::block_on(instance.request_adapter(
        &wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: None,
            force_fallback_adapter: false,
        },
    ))
    .expect("no adapter");
    futures::executor::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("test device"),
        required_features: wgpu::Features::empty(),
        required_limits: wgpu::Limits::downlevel_defaults(),
        experimental_features: wgpu::ExperimentalFeatures::disabled(),
        memory_hints: Default::default(),
        trace: wgpu::Trace::Off,
    }))
    .expect("no device")
}

#[test]
#[cfg(feature = "integration-tests")]
fn should_render_the_background_above_the_horizon() {
    use scene_showcase::{
        config::ShowcaseConfig, data_structures::texture::Texture, render::ScenePasses,
        showcase::Showcase, ui::NullChecklist,
    };

    const SIZE: u32 = 64;
    let (device, queue) = headless_device();
    let showcase = Showcase::new(ShowcaseConfig::default(), Box::new(NullChecklist), SIZE, SIZE);

    let format = wgpu::TextureFormat::Rgba8UnormSrgb;
    let extent = wgpu::Extent3d {
        width: SIZE,
        height: SIZE,
        depth_or_array_layers: 1,
    };
    let target = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("test target"),
        size: extent,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = target.create_view(&wgpu::TextureViewDescriptor::default());
    let depth = Texture::create_depth_texture(&device, [SIZE, SIZE], "test depth");

    let mut passes = ScenePasses::new(&device, format, showcase.scene(), showcase.camera());
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("test encoder"),
    });
    passes.encode(
        &device,
        &queue,
        &mut encoder,
        &view,
        &depth.view,
        showcase.scene(),
        showcase.camera(),
    );
    assert_eq!(passes.uploaded_meshes(), 2);

    let output = device.create_buffer(&wgpu::BufferDescriptor {
        label: None,
        size: (4 * SIZE * SIZE) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            aspect: wgpu::TextureAspect::All,
            texture: &target,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &output,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * SIZE),
                rows_per_image: Some(SIZE),
            },
        },
        extent,
    );
    queue.submit(std::iter::once(encoder.finish()));

    let (tx, rx) = futures::channel::oneshot::channel();
    let slice = output.slice(..);
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device
        .poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: Some(std::time::Duration::from_secs(3)),
        })
        .unwrap();
    futures::executor::block_on(rx).unwrap().unwrap();

    let data = slice.get_mapped_range();
    // 0x282c34 once encoded back to sRGB.
    let expected = [0x28u8, 0x2c, 0x34, 0xff];
    for (got, want) in data[..4].iter().zip(expected) {
        assert!(got.abs_diff(want) <= 1, "{:?}", &data[..4]);
    }
}
