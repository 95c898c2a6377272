//! Built-in probes
//!
//! Each entry is a JavaScript function body run in the page. Sync bodies are
//! compiled with `Function`, async bodies with `AsyncFunction`, so `await`
//! is available in the latter. A body must not contain `"#`.

use phf::phf_ordered_map;

use super::traits::{Executor, Probe, ProbeKind};

/// Definition of one built-in probe
#[derive(Debug, Clone, Copy)]
pub struct BuiltinProbe {
    pub kind: ProbeKind,
    pub body: &'static str,
}

const fn sync(body: &'static str) -> BuiltinProbe {
    BuiltinProbe {
        kind: ProbeKind::Sync,
        body,
    }
}

const fn deferred(body: &'static str) -> BuiltinProbe {
    BuiltinProbe {
        kind: ProbeKind::Async,
        body,
    }
}

/// Built-in probes in registration order
pub static BUILTIN_PROBES: phf::OrderedMap<&'static str, BuiltinProbe> = phf_ordered_map! {
    "anyPointer" => sync(r#"
        for (const pointer of ['fine', 'coarse', 'none']) {
            if (window.matchMedia('(any-pointer: ' + pointer + ')').matches) return pointer;
        }
        return 'unknown';
    "#),
    "anyHover" => sync(r#"
        for (const hover of ['hover', 'none']) {
            if (window.matchMedia('(any-hover: ' + hover + ')').matches) return hover;
        }
        return 'unknown';
    "#),
    "userAgent" => sync("return navigator.userAgent;"),
    "platform" => sync("return navigator.platform;"),
    "vendor" => sync("return navigator.vendor;"),
    "productSub" => sync("return navigator.productSub;"),
    "product" => sync("return navigator.product;"),
    "appName" => sync("return navigator.appName;"),
    "appCodeName" => sync("return navigator.appCodeName;"),
    "onLine" => sync("return navigator.onLine;"),
    "doNotTrack" => sync(r#"
        const dnt = navigator.doNotTrack ?? window.doNotTrack ?? navigator.msDoNotTrack;
        return dnt === '1' || dnt === 'yes';
    "#),
    "cookieEnabled" => sync("return navigator.cookieEnabled;"),
    "hardwareConcurrency" => sync("return navigator.hardwareConcurrency;"),
    "deviceMemory" => sync("return navigator.deviceMemory;"),
    "cpuClass" => sync("return navigator.cpuClass;"),
    "language" => sync("return navigator.language;"),
    "languages" => sync("return navigator.languages;"),
    "timezone" => sync("return new Date().getTimezoneOffset();"),
    "historyLength" => sync("return history.length;"),
    "byteLength" => sync("return new Uint8Array([255]).buffer.byteLength;"),
    "indexedDB" => sync(r#"
        try {
            return !!window.indexedDB;
        } catch (e) {
            return 'error';
        }
    "#),
    "openDatabase" => sync("return !!window.openDatabase;"),
    "computedStyleBody" => sync(r#"
        if (!document.body) return '';
        return Array.from(window.getComputedStyle(document.body)).join(',');
    "#),
    "mimeTypes" => sync(r#"
        return Array.from(navigator.mimeTypes || [], (mt) => [mt.description, mt.type, mt.suffixes].join('~~'));
    "#),
    "plugins" => sync(r#"
        return Array.from(navigator.plugins || [], (p) => [p.name, p.description, p.filename, p.version].join('::'));
    "#),
    "screen" => sync(r#"
        const body = document.body || document.documentElement;
        return {
            wInnerHeight: window.innerHeight,
            wOuterHeight: window.outerHeight,
            wOuterWidth: window.outerWidth,
            wInnerWidth: window.innerWidth,
            wScreenX: window.screenX,
            wPageXOffset: window.pageXOffset,
            wPageYOffset: window.pageYOffset,
            cWidth: body.clientWidth,
            cHeight: body.clientHeight,
            sWidth: screen.width,
            sHeight: screen.height,
            sAvailWidth: screen.availWidth,
            sAvailHeight: screen.availHeight,
            sColorDepth: screen.colorDepth,
            sPixelDepth: screen.pixelDepth,
            wDevicePixelRatio: window.devicePixelRatio,
        };
    "#),
    "screenDesc" => sync(r#"
        try {
            return Object.getOwnPropertyDescriptor(Screen.prototype, 'width').get.toString();
        } catch (e) {
            return 'error';
        }
    "#),
    "screenMediaQuery" => sync(r#"
        return window.matchMedia('(min-width: ' + (window.innerWidth - 1) + 'px)').matches;
    "#),
    "touchScreen" => sync(r#"
        const maxTouchPoints = navigator.maxTouchPoints ?? navigator.msMaxTouchPoints ?? 0;
        let touchEvent = false;
        try {
            document.createEvent('TouchEvent');
            touchEvent = true;
        } catch (e) {}
        return [maxTouchPoints, touchEvent, 'ontouchstart' in window];
    "#),
    "resOverflow" => sync(r#"
        let depth = 0;
        let errorMessage = '';
        let errorName = '';
        let errorStacklength = 0;
        const iWillBetrayYouWithMyLongName = () => {
            try {
                depth++;
                iWillBetrayYouWithMyLongName();
            } catch (e) {
                errorMessage = e.message;
                errorName = e.name;
                errorStacklength = String(e.stack).length;
            }
        };
        iWillBetrayYouWithMyLongName();
        return { depth, errorMessage, errorName, errorStacklength };
    "#),
    "etsl" => sync("return eval.toString().length;"),
    "navigatorPrototype" => sync(r#"
        const proto = Object.getPrototypeOf(navigator);
        const result = {};
        for (const name of Object.getOwnPropertyNames(proto)) {
            try {
                const desc = Object.getOwnPropertyDescriptor(proto, name);
                result[name] = desc.get ? desc.get.toString() : typeof desc.value;
            } catch (e) {
                result[name] = 'error';
            }
        }
        return result;
    "#),
    "webDriver" => sync("return navigator.webdriver === true;"),
    "domAutomation" => sync("return 'domAutomation' in window || 'domAutomationController' in window;"),
    "nightmareJS" => sync("return !!window.__nightmare;"),
    "fmget" => sync("return 'fmget_targets' in window;"),
    "selenium" => sync(r#"
        const markers = [
            '__driver_evaluate', '__webdriver_evaluate', '__selenium_evaluate', '__fxdriver_evaluate',
            '__driver_unwrapped', '__webdriver_unwrapped', '__selenium_unwrapped', '__fxdriver_unwrapped',
            '_Selenium_IDE_Recorder', '_selenium', 'calledSelenium', '$cdc_asdjflasutopfhvcZLmcfl_',
            '$chrome_asyncScriptInfo', '__$webdriverAsyncExecutor', '__webdriverFunc',
            '__lastWatirAlert', '__lastWatirConfirm', '__lastWatirPrompt', '_WEBDRIVER_ELEM_CACHE',
        ];
        const found = markers.filter((m) => m in window || m in document);
        for (const attr of ['selenium', 'webdriver', 'driver']) {
            if (document.documentElement.getAttribute(attr) !== null) found.push('attr:' + attr);
        }
        return found;
    "#),
    "phantomJS" => sync("return ['callPhantom', '_phantom', 'phantom'].filter((m) => m in window);"),
    "sequentum" => sync(r#"
        return window.external !== undefined
            && typeof window.external.toString === 'function'
            && window.external.toString().indexOf('Sequentum') > -1;
    "#),
    "hasChrome" => sync("return window.chrome !== undefined;"),
    "detailChrome" => sync(r#"
        if (window.chrome === undefined) return 'unknown';
        const detail = {};
        for (const property of ['webstore', 'runtime', 'app', 'csi', 'loadTimes']) {
            try {
                detail[property] = window.chrome[property].constructor.toString();
            } catch (e) {
                detail[property] = String(e);
            }
        }
        try {
            window.chrome.runtime.connect('');
        } catch (e) {
            detail.connect = String(e);
        }
        return detail;
    "#),
    "iframeChrome" => sync(r#"
        const iframe = document.createElement('iframe');
        iframe.srcdoc = 'fpcollect';
        (document.body || document.documentElement).appendChild(iframe);
        const result = typeof iframe.contentWindow.chrome;
        iframe.remove();
        return result;
    "#),
    "debugTool" => sync(r#"
        let calls = 0;
        const probe = /./;
        probe.toString = () => {
            calls++;
            return 'fpcollect';
        };
        console.debug(probe);
        return calls > 1;
    "#),
    "videoCard" => sync(r#"
        const canvas = document.createElement('canvas');
        const ctx = canvas.getContext('webgl') || canvas.getContext('experimental-webgl');
        if (!ctx) return 'unknown';
        const info = ctx.getExtension('WEBGL_debug_renderer_info');
        if (info) {
            return [ctx.getParameter(info.UNMASKED_VENDOR_WEBGL), ctx.getParameter(info.UNMASKED_RENDERER_WEBGL)];
        }
        return [ctx.getParameter(ctx.VENDOR), ctx.getParameter(ctx.RENDERER)];
    "#),
    "tpCanvas" => sync(r#"
        const canvas = document.createElement('canvas');
        canvas.width = 1;
        canvas.height = 1;
        const data = canvas.getContext('2d').getImageData(0, 0, 1, 1).data;
        return { 0: data[0], 1: data[1], 2: data[2], 3: data[3] };
    "#),
    "gamut" => sync(r#"
        const result = {};
        for (const gamut of ['srgb', 'p3', 'rec2020']) {
            result[gamut] = window.matchMedia('(color-gamut: ' + gamut + ')').matches;
        }
        return result;
    "#),
    "videoCodecs" => sync(r#"
        const video = document.createElement('video');
        if (!video.canPlayType) return 'unknown';
        return {
            ogg: video.canPlayType('video/ogg; codecs="theora"'),
            h264: video.canPlayType('video/mp4; codecs="avc1.42E01E"'),
            webm: video.canPlayType('video/webm; codecs="vp8, vorbis"'),
            mpeg4v: video.canPlayType('video/mp4; codecs="mp4v.20.8, mp4a.40.2"'),
            mpeg4a: video.canPlayType('video/mp4; codecs="mp4v.20.240, mp4a.40.2"'),
            theora: video.canPlayType('video/x-matroska; codecs="theora"'),
        };
    "#),
    "audioCodecs" => sync(r#"
        const audio = document.createElement('audio');
        if (!audio.canPlayType) return 'unknown';
        return {
            ogg: audio.canPlayType('audio/ogg; codecs="vorbis"'),
            mp3: audio.canPlayType('audio/mpeg;'),
            wav: audio.canPlayType('audio/wav; codecs="1"'),
            m4a: audio.canPlayType('audio/x-m4a;'),
            aac: audio.canPlayType('audio/aac;'),
        };
    "#),
    "canvas" => deferred(r#"
        if (document.fonts) await document.fonts.ready;
        const canvas = document.createElement('canvas');
        canvas.width = 200;
        canvas.height = 60;
        const ctx = canvas.getContext('2d');
        ctx.textBaseline = 'top';
        ctx.font = '14px Arial';
        ctx.fillStyle = '#f60';
        ctx.fillRect(125, 1, 62, 20);
        ctx.fillStyle = '#069';
        ctx.fillText('fpcollect, 😃', 2, 15);
        ctx.fillStyle = 'rgba(102, 204, 0, 0.7)';
        ctx.fillText('fpcollect, 😃', 4, 17);
        const image = canvas.toDataURL();
        let hash = 0;
        for (let i = 0; i < image.length; i++) {
            hash = ((hash << 5) - hash + image.charCodeAt(i)) | 0;
        }
        return { image, hash };
    "#),
    "audio" => deferred(r#"
        const AudioContext = window.OfflineAudioContext || window.webkitOfflineAudioContext;
        if (!AudioContext) return { supported: false };
        const context = new AudioContext(1, 44100, 44100);
        const oscillator = context.createOscillator();
        oscillator.type = 'triangle';
        oscillator.frequency.value = 10000;
        const compressor = context.createDynamicsCompressor();
        compressor.threshold.value = -50;
        compressor.knee.value = 40;
        compressor.ratio.value = 12;
        compressor.attack.value = 0;
        compressor.release.value = 0.25;
        oscillator.connect(compressor);
        compressor.connect(context.destination);
        oscillator.start(0);
        const buffer = await context.startRendering();
        let sum = 0;
        for (const sample of buffer.getChannelData(0).subarray(4500, 5000)) {
            sum += Math.abs(sample);
        }
        return { supported: true, sampleRate: context.sampleRate, sum };
    "#),
    "battery" => deferred(r#"
        if (typeof navigator.getBattery !== 'function') return false;
        const manager = await navigator.getBattery();
        return manager !== undefined && manager !== null;
    "#),
    "accelerometerUsed" => deferred(r#"
        return await new Promise((resolve) => {
            const onMotion = (event) => {
                window.removeEventListener('devicemotion', onMotion);
                const acceleration = event.accelerationIncludingGravity;
                resolve(acceleration !== null && acceleration.x !== null);
            };
            window.addEventListener('devicemotion', onMotion);
            setTimeout(() => {
                window.removeEventListener('devicemotion', onMotion);
                resolve(false);
            }, 300);
        });
    "#),
    "multimediaDevices" => deferred(r#"
        if (!navigator.mediaDevices || !navigator.mediaDevices.enumerateDevices) {
            return { speakers: 0, micros: 0, webcams: 0 };
        }
        const devices = await navigator.mediaDevices.enumerateDevices();
        const count = (kind) => devices.filter((d) => d.kind === kind).length;
        return { speakers: count('audiooutput'), micros: count('audioinput'), webcams: count('videoinput') };
    "#),
};

/// Built-in probes as catalog entries, in table order
pub fn probes() -> impl Iterator<Item = Probe> {
    BUILTIN_PROBES
        .entries()
        .map(|(name, probe)| Probe::new(*name, probe.kind, Executor::script(probe.body)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_order_and_kinds() {
        let names: Vec<&str> = BUILTIN_PROBES.keys().copied().collect();
        assert_eq!(names.first(), Some(&"anyPointer"));
        assert_eq!(names.last(), Some(&"multimediaDevices"));

        let async_names: Vec<&str> = BUILTIN_PROBES
            .entries()
            .filter(|(_, p)| p.kind.is_async())
            .map(|(name, _)| *name)
            .collect();
        assert_eq!(async_names, ["canvas", "audio", "battery", "accelerometerUsed", "multimediaDevices"]);
    }

    #[test]
    fn test_bodies_return_values() {
        for (name, probe) in BUILTIN_PROBES.entries() {
            assert!(probe.body.contains("return"), "probe {} never returns", name);
        }
    }

    #[test]
    fn test_probes_are_scripts() {
        let probes: Vec<Probe> = probes().collect();
        assert_eq!(probes.len(), BUILTIN_PROBES.len());
        assert!(probes.iter().all(|p| matches!(p.executor, Executor::Script(_))));
        assert_eq!(probes.iter().find(|p| p.name == "webDriver").map(|p| p.kind), Some(ProbeKind::Sync));
    }
}
