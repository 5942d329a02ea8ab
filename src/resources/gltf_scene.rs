//! glTF to scene graph conversion.
//!
//! Parsing is left to the `gltf` crate; this module resolves buffer and image
//! sources through an [`AssetFetcher`], then walks the default scene and
//! builds one [`SceneNode`] per glTF node with its local transform and one
//! [`MeshData`] per triangle-list primitive.

use std::{collections::HashMap, sync::Arc};

use cgmath::{InnerSpace, Quaternion, Vector3};

use crate::{
    data_structures::{
        instance::Instance,
        model::{Material, MeshData, ModelVertex},
        scene_graph::SceneNode,
        texture::TextureData,
    },
    loader::AssetLoadError,
    resources::{AssetFetcher, resolve_relative},
};

/// Parse `bytes`, the contents of the glTF or GLB file at `path`, into a
/// detached scene node. External buffers and images are fetched relative to
/// `path`.
pub async fn load_model_gltf(
    path: &str,
    bytes: &[u8],
    fetcher: &dyn AssetFetcher,
) -> Result<SceneNode, AssetLoadError> {
    let gltf = gltf::Gltf::from_slice(bytes).map_err(|source| AssetLoadError::Parse {
        path: path.to_string(),
        source,
    })?;

    let buffers = load_buffers(path, &gltf, fetcher).await?;
    let images = load_base_colour_images(path, &gltf, &buffers, fetcher).await?;
    let materials: Vec<Material> = gltf
        .materials()
        .map(|material| convert_material(&material, &images))
        .collect();

    let Some(scene) = gltf.default_scene().or_else(|| gltf.scenes().next()) else {
        log::warn!("{} contains no scene", path);
        return Ok(SceneNode::group(path));
    };

    let mut ancestors = Vec::new();
    let mut roots: Vec<SceneNode> = scene
        .nodes()
        .map(|node| to_scene_node(path, &node, &buffers, &materials, &mut ancestors))
        .collect::<Result<_, _>>()?;

    let root = if roots.len() == 1 {
        roots.remove(0)
    } else {
        let mut group = SceneNode::group(scene.name().unwrap_or(path));
        for node in roots {
            group.add_child(node);
        }
        group
    };
    log::debug!("{}: {} nodes", path, root.node_count());
    Ok(root)
}

async fn fetch_external(
    path: &str,
    uri: &str,
    fetcher: &dyn AssetFetcher,
) -> Result<(Vec<u8>, String), AssetLoadError> {
    // Embedded data URIs and remote URLs are not fetched.
    if uri.contains(':') {
        return Err(AssetLoadError::UnsupportedUri {
            path: path.to_string(),
            uri: uri.chars().take(64).collect(),
        });
    }
    let decoded = urlencoding::decode(uri).map_err(|e| AssetLoadError::Malformed {
        path: path.to_string(),
        reason: format!("bad URI {}: {}", uri, e),
    })?;
    let target = if decoded.starts_with('/') {
        decoded.into_owned()
    } else {
        resolve_relative(path, &decoded)
    };
    match fetcher.fetch(&target, None).await {
        Ok(bytes) => Ok((bytes, target)),
        Err(source) => Err(AssetLoadError::Fetch {
            path: target,
            source,
        }),
    }
}

async fn load_buffers(
    path: &str,
    gltf: &gltf::Gltf,
    fetcher: &dyn AssetFetcher,
) -> Result<Vec<Vec<u8>>, AssetLoadError> {
    let mut data = Vec::new();
    for buffer in gltf.buffers() {
        let bytes = match buffer.source() {
            gltf::buffer::Source::Bin => {
                gltf.blob
                    .clone()
                    .ok_or_else(|| AssetLoadError::Malformed {
                        path: path.to_string(),
                        reason: "buffer refers to a missing binary chunk".to_string(),
                    })?
            }
            gltf::buffer::Source::Uri(uri) => fetch_external(path, uri, fetcher).await?.0,
        };
        if bytes.len() < buffer.length() {
            return Err(AssetLoadError::Malformed {
                path: path.to_string(),
                reason: format!(
                    "buffer {} holds {} bytes, {} declared",
                    buffer.index(),
                    bytes.len(),
                    buffer.length()
                ),
            });
        }
        data.push(bytes);
    }
    Ok(data)
}

/// Decode every image used as a base colour texture, keyed by image index.
async fn load_base_colour_images(
    path: &str,
    gltf: &gltf::Gltf,
    buffers: &[Vec<u8>],
    fetcher: &dyn AssetFetcher,
) -> Result<HashMap<usize, Arc<TextureData>>, AssetLoadError> {
    let mut images = HashMap::new();
    for material in gltf.materials() {
        let Some(info) = material.pbr_metallic_roughness().base_color_texture() else {
            continue;
        };
        let image = info.texture().source();
        if images.contains_key(&image.index()) {
            continue;
        }
        let (encoded, label) = match image.source() {
            gltf::image::Source::View { view, .. } => {
                let start = view.offset();
                let end = start + view.length();
                let bytes = buffers
                    .get(view.buffer().index())
                    .and_then(|buffer| buffer.get(start..end))
                    .ok_or_else(|| AssetLoadError::Malformed {
                        path: path.to_string(),
                        reason: format!("image {} points outside its buffer", image.index()),
                    })?;
                (bytes.to_vec(), path.to_string())
            }
            gltf::image::Source::Uri { uri, .. } => fetch_external(path, uri, fetcher).await?,
        };
        let decoded = image::load_from_memory(&encoded).map_err(|source| AssetLoadError::Image {
            path: label,
            source,
        })?;
        images.insert(image.index(), Arc::new(TextureData::from_image(&decoded)));
    }
    Ok(images)
}

fn convert_material(
    material: &gltf::Material,
    images: &HashMap<usize, Arc<TextureData>>,
) -> Material {
    let pbr = material.pbr_metallic_roughness();
    let name = match (material.name(), material.index()) {
        (Some(name), _) => name.to_string(),
        (None, Some(index)) => format!("material{}", index),
        (None, None) => "default".to_string(),
    };
    Material {
        name,
        base_colour: pbr.base_color_factor(),
        base_colour_texture: pbr
            .base_color_texture()
            .and_then(|info| images.get(&info.texture().source().index()).cloned()),
        double_sided: material.double_sided(),
    }
}

/// `ancestors` holds the indices of the nodes above `node`. The `gltf` crate
/// does not reject cyclic hierarchies, so a repeat is reported here.
fn to_scene_node(
    path: &str,
    node: &gltf::Node,
    buffers: &[Vec<u8>],
    materials: &[Material],
    ancestors: &mut Vec<usize>,
) -> Result<SceneNode, AssetLoadError> {
    if ancestors.contains(&node.index()) {
        return Err(AssetLoadError::Malformed {
            path: path.to_string(),
            reason: format!("node {} is its own ancestor", node.index()),
        });
    }
    let name = node
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("node{}", node.index()));
    let mut scene_node = SceneNode::group(name.clone());

    let (translation, [x, y, z, w], scale) = node.transform().decomposed();
    scene_node.transform = Instance {
        position: translation.into(),
        rotation: Quaternion::new(w, x, y, z),
        scale: scale.into(),
    };

    if let Some(mesh) = node.mesh() {
        let mesh_name = mesh.name().unwrap_or(&name).to_string();
        for primitive in mesh.primitives() {
            let material = primitive
                .material()
                .index()
                .and_then(|index| materials.get(index).cloned())
                .unwrap_or_default();
            let label = format!("{}#{}", mesh_name, primitive.index());
            if let Some(data) = read_primitive(&label, &primitive, buffers, material) {
                scene_node.meshes.push(Arc::new(data));
            }
        }
    }

    ancestors.push(node.index());
    for child in node.children() {
        let child = to_scene_node(path, &child, buffers, materials, ancestors)?;
        scene_node.add_child(child);
    }
    ancestors.pop();
    Ok(scene_node)
}

fn read_primitive(
    label: &str,
    primitive: &gltf::Primitive,
    buffers: &[Vec<u8>],
    material: Material,
) -> Option<MeshData> {
    if primitive.mode() != gltf::mesh::Mode::Triangles {
        log::warn!("{}: skipping {:?} primitive", label, primitive.mode());
        return None;
    }
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
    let Some(positions) = reader.read_positions() else {
        log::warn!("{}: primitive has no positions", label);
        return None;
    };
    let positions: Vec<[f32; 3]> = positions.collect();
    let tex_coords: Vec<[f32; 2]> = reader
        .read_tex_coords(0)
        .map(|coords| coords.into_f32().collect())
        .unwrap_or_default();
    let mut indices: Vec<u32> = reader
        .read_indices()
        .map(|indices| indices.into_u32().collect())
        .unwrap_or_else(|| (0..positions.len() as u32).collect());

    if indices.iter().any(|&i| i as usize >= positions.len()) {
        log::warn!("{}: index out of range, skipping primitive", label);
        return None;
    }
    if indices.len() % 3 != 0 {
        log::warn!("{}: dropping a trailing partial triangle", label);
        indices.truncate(indices.len() - indices.len() % 3);
    }

    let tex_coord = |i: usize| tex_coords.get(i).copied().unwrap_or_default();
    let (vertices, indices) = match reader.read_normals() {
        Some(normals) => {
            let normals: Vec<[f32; 3]> = normals.collect();
            let vertices = positions
                .iter()
                .enumerate()
                .map(|(i, &position)| ModelVertex {
                    position,
                    tex_coords: tex_coord(i),
                    normal: normals.get(i).copied().unwrap_or([0.0, 1.0, 0.0]),
                })
                .collect();
            (vertices, indices)
        }
        None => flat_shaded(&positions, &tex_coord, &indices),
    };

    Some(MeshData::new(label, vertices, indices, material))
}

/// Unweld the triangles so every face gets its own normal.
fn flat_shaded(
    positions: &[[f32; 3]],
    tex_coord: &dyn Fn(usize) -> [f32; 2],
    indices: &[u32],
) -> (Vec<ModelVertex>, Vec<u32>) {
    let mut vertices = Vec::with_capacity(indices.len());
    for triangle in indices.chunks_exact(3) {
        let [a, b, c] = [triangle[0], triangle[1], triangle[2]]
            .map(|i| Vector3::from(positions[i as usize]));
        let cross = (b - a).cross(c - a);
        let normal = if cross.magnitude2() > f32::EPSILON {
            cross.normalize().into()
        } else {
            [0.0, 1.0, 0.0]
        };
        for &i in triangle {
            vertices.push(ModelVertex {
                position: positions[i as usize],
                tex_coords: tex_coord(i as usize),
                normal,
            });
        }
    }
    let indices = (0..vertices.len() as u32).collect();
    (vertices, indices)
}
